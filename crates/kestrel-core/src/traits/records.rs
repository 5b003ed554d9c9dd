// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only structured record store trait.

use async_trait::async_trait;

use crate::domain::{FailAnalysis, InspectionRecord, Period, RecordFilter, Statistics, TrendPoint};
use crate::error::KestrelError;
use crate::traits::adapter::PluginAdapter;

/// Read-only access to inspection records.
#[async_trait]
pub trait RecordStore: PluginAdapter {
    /// Aggregate counts for `period`.
    async fn get_statistics(&self, period: Period) -> Result<Statistics, KestrelError>;

    /// Most recent records, newest first.
    async fn get_recent(&self, limit: usize) -> Result<Vec<InspectionRecord>, KestrelError>;

    /// Today's failures grouped by device and station.
    async fn get_fail_analysis(&self) -> Result<FailAnalysis, KestrelError>;

    /// Per-day series covering `period`, oldest day first.
    async fn get_trend(&self, period: Period) -> Result<Vec<TrendPoint>, KestrelError>;

    /// Ad-hoc filtered lookup, newest first.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<InspectionRecord>, KestrelError>;
}
