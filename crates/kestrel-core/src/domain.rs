// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspection-data types shared by the record store, tools, and engines.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Relative time window used by statistics and trend queries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Today,
    Yesterday,
    Week,
    Month,
    All,
}

impl Period {
    /// Number of days covered by a trend query over this period.
    pub fn trend_days(&self) -> u32 {
        match self {
            Period::Week => 7,
            _ => 30,
        }
    }
}

/// Outcome of one physical inspection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[strum(to_string = "pass", serialize = "ok")]
    Pass,
    #[strum(to_string = "fail", serialize = "ng")]
    Fail,
}

/// One row of the inspections table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: i64,
    /// ISO-8601 local timestamp, as written by the inspection station.
    pub timestamp: String,
    pub device_id: String,
    #[serde(default)]
    pub image_id: Option<String>,
    pub result: Verdict,
    pub station: String,
}

impl InspectionRecord {
    /// Text used for embedding and keyword matching of this record.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} at {} {}",
            self.device_id, self.result, self.station, self.timestamp
        )
    }
}

/// Aggregate counts for a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: u64,
    pub pass: u64,
    pub fail: u64,
    /// Percentage in `[0, 100]`; zero when `total` is zero.
    pub pass_rate: f64,
}

impl Statistics {
    /// Builds statistics from raw counts, computing the pass rate.
    pub fn from_counts(total: u64, pass: u64, fail: u64) -> Self {
        let pass_rate = if total > 0 {
            pass as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total,
            pass,
            fail,
            pass_rate,
        }
    }
}

/// Failures grouped by device and station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailGroup {
    pub device_id: String,
    pub station: String,
    pub fail_count: u64,
    pub first_fail: String,
    pub last_fail: String,
}

/// Breakdown of today's failures, largest group first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailAnalysis {
    pub groups: Vec<FailGroup>,
}

impl FailAnalysis {
    pub fn total_failures(&self) -> u64 {
        self.groups.iter().map(|g| g.fail_count).sum()
    }
}

/// One day of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub total: u64,
    pub pass: u64,
    pub fail: u64,
    pub pass_rate: f64,
}

/// Filter for ad-hoc record queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub period: Option<Period>,
    pub device_id: Option<String>,
    pub station: Option<String>,
    pub result: Option<Verdict>,
    pub limit: usize,
}

impl RecordFilter {
    /// Returns true when the record satisfies every set field except the
    /// period, which needs a clock and is applied by the store.
    pub fn matches_fields(&self, record: &InspectionRecord) -> bool {
        self.device_id
            .as_deref()
            .is_none_or(|d| d.eq_ignore_ascii_case(&record.device_id))
            && self
                .station
                .as_deref()
                .is_none_or(|s| s.eq_ignore_ascii_case(&record.station))
            && self.result.is_none_or(|r| r == record.result)
    }
}

/// A document-corpus search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub source: String,
    pub excerpt: String,
    #[serde(default)]
    pub score: u32,
}
