// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory record store and document search for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use kestrel_core::{
    AdapterType, DocumentHit, DocumentSearch, FailAnalysis, HealthStatus, InspectionRecord,
    KestrelError, Period, PluginAdapter, RecordFilter, RecordStore, Statistics, TrendPoint,
};

fn unavailable(what: &str) -> KestrelError {
    KestrelError::Storage {
        source: format!("mock {what} unavailable").into(),
    }
}

/// A record store answering from pre-configured data.
///
/// Periods without configured statistics report zero counts. `query`
/// applies the field filters and limit to the configured records but
/// ignores the period.
#[derive(Default)]
pub struct MockRecordStore {
    statistics: HashMap<Period, Statistics>,
    records: Vec<InspectionRecord>,
    fail_analysis: FailAnalysis,
    trends: HashMap<Period, Vec<TrendPoint>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statistics(mut self, period: Period, stats: Statistics) -> Self {
        self.statistics.insert(period, stats);
        self
    }

    /// Records newest first.
    pub fn with_records(mut self, records: Vec<InspectionRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn with_fail_analysis(mut self, analysis: FailAnalysis) -> Self {
        self.fail_analysis = analysis;
        self
    }

    pub fn with_trend(mut self, period: Period, points: Vec<TrendPoint>) -> Self {
        self.trends.insert(period, points);
        self
    }

    /// A store whose every call fails.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), KestrelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable("record store"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PluginAdapter for MockRecordStore {
    fn name(&self) -> &str {
        "mock-records"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn get_statistics(&self, period: Period) -> Result<Statistics, KestrelError> {
        self.enter()?;
        Ok(self.statistics.get(&period).cloned().unwrap_or_default())
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<InspectionRecord>, KestrelError> {
        self.enter()?;
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    async fn get_fail_analysis(&self) -> Result<FailAnalysis, KestrelError> {
        self.enter()?;
        Ok(self.fail_analysis.clone())
    }

    async fn get_trend(&self, period: Period) -> Result<Vec<TrendPoint>, KestrelError> {
        self.enter()?;
        Ok(self.trends.get(&period).cloned().unwrap_or_default())
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<InspectionRecord>, KestrelError> {
        self.enter()?;
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };
        Ok(self
            .records
            .iter()
            .filter(|r| filter.matches_fields(r))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Document search returning fixed hits.
#[derive(Default)]
pub struct MockDocuments {
    hits: Vec<DocumentHit>,
    failing: AtomicBool,
}

impl MockDocuments {
    pub fn new(hits: Vec<DocumentHit>) -> Self {
        Self {
            hits,
            failing: AtomicBool::new(false),
        }
    }

    pub fn unavailable() -> Self {
        let docs = Self::default();
        docs.failing.store(true, Ordering::SeqCst);
        docs
    }
}

#[async_trait]
impl PluginAdapter for MockDocuments {
    fn name(&self) -> &str {
        "mock-documents"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DocumentSearch
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentSearch for MockDocuments {
    async fn search(&self, _query: &str) -> Result<Vec<DocumentHit>, KestrelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("document search"));
        }
        Ok(self.hits.iter().take(3).cloned().collect())
    }

    fn document_count(&self) -> usize {
        self.hits.len()
    }
}
