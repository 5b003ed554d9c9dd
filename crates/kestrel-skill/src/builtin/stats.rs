// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate tools: statistics for a period, period comparison, and trend
//! direction.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{KestrelError, Period, RecordStore, Statistics, TrendPoint};
use kestrel_router::IntentClassifier;
use serde::Serialize;

use super::{period_from_input, round1};
use crate::tool::{Tool, ToolName, ToolOutput};

fn to_json<T: Serialize>(value: &T) -> Result<String, KestrelError> {
    serde_json::to_string_pretty(value).map_err(|e| KestrelError::Tool {
        message: format!("failed to encode output: {e}"),
        source: Some(Box::new(e)),
    })
}

fn stats_json(period: Period, stats: &Statistics) -> serde_json::Value {
    serde_json::json!({
        "period": period.to_string(),
        "total": stats.total,
        "pass": stats.pass,
        "fail": stats.fail,
        "pass_rate": round1(stats.pass_rate),
    })
}

/// Statistics for one period, defaulting to today.
pub struct GetStatisticsTool {
    records: Arc<dyn RecordStore>,
}

impl GetStatisticsTool {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Tool for GetStatisticsTool {
    fn name(&self) -> ToolName {
        ToolName::GetStatistics
    }

    fn description(&self) -> &str {
        "Get total/pass/fail counts and pass rate. Input: period (today, yesterday, week, month, all)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "enum": ["today", "yesterday", "week", "month", "all"],
            "default": "today"
        })
    }

    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
        let period = period_from_input(input, Period::Today);
        let stats = self.records.get_statistics(period).await?;
        Ok(ToolOutput::ok(to_json(&stats_json(period, &stats))?))
    }
}

/// Side-by-side statistics for two periods with their differences.
pub struct CompareTool {
    records: Arc<dyn RecordStore>,
}

impl CompareTool {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// The first two periods named in `input`, else today and yesterday.
    pub fn periods(input: &str) -> (Period, Period) {
        match IntentClassifier::periods_in(input).as_slice() {
            [first, second, ..] => (*first, *second),
            _ => (Period::Today, Period::Yesterday),
        }
    }
}

#[async_trait]
impl Tool for CompareTool {
    fn name(&self) -> ToolName {
        ToolName::Compare
    }

    fn description(&self) -> &str {
        "Compare statistics of two periods, e.g. \"today vs yesterday\""
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "description": "two periods to compare; defaults to today vs yesterday"
        })
    }

    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
        let (first, second) = Self::periods(input);
        let a = self.records.get_statistics(first).await?;
        let b = self.records.get_statistics(second).await?;

        let diff = |x: u64, y: u64| x as i64 - y as i64;
        let mut body = serde_json::Map::new();
        body.insert(first.to_string(), stats_json(first, &a));
        body.insert(second.to_string(), stats_json(second, &b));
        body.insert(
            "difference".to_string(),
            serde_json::json!({
                "total": diff(a.total, b.total),
                "pass": diff(a.pass, b.pass),
                "fail": diff(a.fail, b.fail),
                "pass_rate_change": round1(a.pass_rate - b.pass_rate),
            }),
        );
        Ok(ToolOutput::ok(to_json(&body)?))
    }
}

/// Direction of the pass rate between the first and last day of a series.
pub fn trend_direction(points: &[TrendPoint]) -> &'static str {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => {
            if last.pass_rate > first.pass_rate {
                "improving"
            } else if last.pass_rate < first.pass_rate {
                "declining"
            } else {
                "stable"
            }
        }
        _ => "insufficient data",
    }
}

/// Daily series plus an improving/declining/stable verdict.
pub struct AnalyzeTrendTool {
    records: Arc<dyn RecordStore>,
}

impl AnalyzeTrendTool {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Tool for AnalyzeTrendTool {
    fn name(&self) -> ToolName {
        ToolName::AnalyzeTrend
    }

    fn description(&self) -> &str {
        "Analyze the daily pass-rate trend. Input: period (week or month)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "enum": ["week", "month"],
            "default": "week"
        })
    }

    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
        let period = period_from_input(input, Period::Week);
        let points = self.records.get_trend(period).await?;
        let body = serde_json::json!({
            "period": period.to_string(),
            "days_analyzed": points.len(),
            "trend": trend_direction(&points),
            "daily_stats": points,
        });
        Ok(ToolOutput::ok(to_json(&body)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_test_utils::MockRecordStore;

    fn point(date: &str, pass: u64, total: u64) -> TrendPoint {
        let stats = Statistics::from_counts(total, pass, total - pass);
        TrendPoint {
            date: date.into(),
            total,
            pass,
            fail: total - pass,
            pass_rate: stats.pass_rate,
        }
    }

    fn store() -> Arc<MockRecordStore> {
        Arc::new(
            MockRecordStore::new()
                .with_statistics(Period::Today, Statistics::from_counts(7, 5, 2))
                .with_statistics(Period::Yesterday, Statistics::from_counts(10, 9, 1))
                .with_statistics(Period::Week, Statistics::from_counts(50, 40, 10))
                .with_trend(
                    Period::Week,
                    vec![point("2026-10-14", 9, 10), point("2026-10-16", 5, 7)],
                ),
        )
    }

    #[tokio::test]
    async fn statistics_default_to_today() {
        let output = GetStatisticsTool::new(store()).invoke("").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(json["period"], "today");
        assert_eq!(json["total"], 7);
        assert_eq!(json["pass_rate"], 71.4);
    }

    #[tokio::test]
    async fn statistics_for_named_period() {
        let output = GetStatisticsTool::new(store()).invoke("week").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(json["total"], 50);
    }

    #[tokio::test]
    async fn compare_today_and_yesterday() {
        let output = CompareTool::new(store())
            .invoke("today vs yesterday")
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(json["today"]["total"], 7);
        assert_eq!(json["yesterday"]["total"], 10);
        assert_eq!(json["difference"]["total"], -3);
        assert_eq!(json["difference"]["fail"], 1);
        assert_eq!(json["difference"]["pass_rate_change"], -18.6);
    }

    #[test]
    fn compare_period_selection() {
        assert_eq!(
            CompareTool::periods("this week against today"),
            (Period::Week, Period::Today)
        );
        assert_eq!(CompareTool::periods("something"), (Period::Today, Period::Yesterday));
        assert_eq!(CompareTool::periods("month"), (Period::Today, Period::Yesterday));
    }

    #[tokio::test]
    async fn trend_reports_direction() {
        let output = AnalyzeTrendTool::new(store()).invoke("week").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(json["trend"], "declining");
        assert_eq!(json["days_analyzed"], 2);
    }

    #[test]
    fn trend_direction_cases() {
        assert_eq!(trend_direction(&[]), "insufficient data");
        assert_eq!(trend_direction(&[point("d", 1, 2)]), "insufficient data");
        assert_eq!(
            trend_direction(&[point("a", 1, 2), point("b", 2, 2)]),
            "improving"
        );
        assert_eq!(
            trend_direction(&[point("a", 1, 2), point("b", 1, 2)]),
            "stable"
        );
    }

    #[tokio::test]
    async fn empty_trend_is_insufficient() {
        let output = AnalyzeTrendTool::new(store()).invoke("month").await.unwrap();
        assert!(output.content.contains("insufficient data"));
    }
}
