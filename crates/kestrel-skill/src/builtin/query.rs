// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in record lookup tool.
//!
//! Reads device, station, period, and result from free text with the
//! intent classifier's entity extraction, then runs a filtered query.
//! Output is JSON, clipped to the configured observation size.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{KestrelError, Period, RecordFilter, RecordStore, Slot, Verdict};
use kestrel_router::IntentClassifier;

use super::clip;
use crate::tool::{Tool, ToolName, ToolOutput};

/// Records returned when the input names no limit.
const DEFAULT_LIMIT: usize = 20;

/// Largest limit accepted from input.
const MAX_LIMIT: usize = 100;

pub struct QueryDatabaseTool {
    records: Arc<dyn RecordStore>,
    classifier: Arc<IntentClassifier>,
    max_chars: usize,
}

impl QueryDatabaseTool {
    pub fn new(
        records: Arc<dyn RecordStore>,
        classifier: Arc<IntentClassifier>,
        max_chars: usize,
    ) -> Self {
        Self {
            records,
            classifier,
            max_chars,
        }
    }

    /// Builds a filter from free text such as `"fail Camera_03 today 10"`.
    pub fn filter_from_input(&self, input: &str) -> RecordFilter {
        let entities = self.classifier.classify(input).entities;
        let limit = input
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .find_map(|t| t.parse::<usize>().ok())
            .filter(|n| (1..=MAX_LIMIT).contains(n))
            .unwrap_or(DEFAULT_LIMIT);

        RecordFilter {
            period: entities
                .get(&Slot::TimePeriod)
                .and_then(|p| Period::from_str(p).ok()),
            device_id: entities.get(&Slot::Device).cloned(),
            station: entities.get(&Slot::Station).cloned(),
            result: entities
                .get(&Slot::Result)
                .and_then(|r| Verdict::from_str(r).ok()),
            limit,
        }
    }
}

#[async_trait]
impl Tool for QueryDatabaseTool {
    fn name(&self) -> ToolName {
        ToolName::QueryDatabase
    }

    fn description(&self) -> &str {
        "Look up inspection records. Input: free text naming any of device, station, period (today/yesterday/week/month), result (pass/fail) and a count"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "description": "e.g. \"fail records for Camera_03 today, 10\""
        })
    }

    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
        let filter = self.filter_from_input(input);
        let records = self.records.query(&filter).await?;
        if records.is_empty() {
            return Ok(ToolOutput::ok(format!(
                "No records found ({})",
                serde_json::to_string(&filter).unwrap_or_default()
            )));
        }

        let json = serde_json::to_string(&records).map_err(|e| KestrelError::Tool {
            message: format!("failed to encode records: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(ToolOutput::ok(clip(&json, self.max_chars)))
    }
}
