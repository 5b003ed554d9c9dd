// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence gathering for a classified query.
//!
//! The [`EvidenceGatherer`] maps an intent to a fixed set of
//! [`Section`]s and fetches them concurrently from the record store and
//! document corpus. A failed fetch leaves its section absent; reasoning
//! treats an absent section as unknown, never as zero.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use kestrel_core::text::truncate_chars;
use kestrel_core::{
    DocumentSearch, Intent, IntentResult, KestrelError, Period, RecordFilter, RecordStore, Slot,
    Statistics, Verdict,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};
use tracing::{debug, warn};

/// Records fetched for troubleshooting context.
const RECENT_CONTEXT_LIMIT: usize = 20;

/// Records fetched as supporting detail for summaries and analyses.
const DETAIL_LIMIT: usize = 15;

/// Records listed for detail and latest queries.
const RECENT_ITEMS_LIMIT: usize = 10;

/// A named part of an [`EvidenceBundle`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Statistics,
    FailAnalysis,
    RecentContext,
    Details,
    RecentItems,
    Documents,
    LongTermInsights,
    SimilarRecords,
    ToolObservations,
}

/// Structured data assembled from collaborators to ground one answer.
///
/// Every section is written once, by the collaborator call that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvidenceBundle {
    sections: BTreeMap<Section, Value>,
}

impl EvidenceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: Section, value: Value) {
        self.sections.insert(section, value);
    }

    pub fn get(&self, section: Section) -> Option<&Value> {
        self.sections.get(&section)
    }

    pub fn contains(&self, section: Section) -> bool {
        self.sections.contains_key(&section)
    }

    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.sections.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// The statistics section, if present and well-formed.
    pub fn statistics(&self) -> Option<PeriodStatistics> {
        self.get(Section::Statistics)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Compact JSON text of the whole bundle.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.sections).unwrap_or_default()
    }

    /// Pretty JSON for prompts, clipped to `max_chars`.
    pub fn render_for_prompt(&self, max_chars: usize) -> String {
        if self.sections.is_empty() {
            return "(no evidence could be retrieved)".to_string();
        }
        let pretty = serde_json::to_string_pretty(&self.sections).unwrap_or_default();
        let clipped = truncate_chars(&pretty, max_chars);
        if clipped.len() < pretty.len() {
            format!("{clipped}\n... (truncated)")
        } else {
            pretty
        }
    }
}

/// Statistics for a named period, as stored in the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStatistics {
    pub period: Period,
    #[serde(flatten)]
    pub stats: Statistics,
}

/// Fans out to the collaborators an intent needs.
pub struct EvidenceGatherer {
    records: Arc<dyn RecordStore>,
    documents: Arc<dyn DocumentSearch>,
}

impl EvidenceGatherer {
    pub fn new(records: Arc<dyn RecordStore>, documents: Arc<dyn DocumentSearch>) -> Self {
        Self { records, documents }
    }

    /// Sections gathered for each intent.
    pub fn plan(intent: Intent) -> &'static [Section] {
        match intent {
            Intent::Troubleshoot => &[
                Section::FailAnalysis,
                Section::RecentContext,
                Section::Statistics,
                Section::Documents,
            ],
            Intent::Analyze | Intent::Summary => &[Section::Statistics, Section::Details],
            Intent::Detail | Intent::Latest => &[Section::RecentItems],
            Intent::Count => &[Section::Statistics],
        }
    }

    /// Gathers every section the intent needs, concurrently.
    ///
    /// Collaborator failures are logged and leave the section absent.
    pub async fn gather(&self, query: &str, intent: &IntentResult) -> EvidenceBundle {
        let plan = Self::plan(intent.intent);
        let results = join_all(plan.iter().map(|&section| async move {
            (section, self.fetch(section, query, intent).await)
        }))
        .await;

        let mut bundle = EvidenceBundle::new();
        for (section, result) in results {
            match result {
                Ok(value) => bundle.insert(section, value),
                Err(e) => warn!(
                    section = %section,
                    error = %e,
                    "evidence source unavailable, section left absent"
                ),
            }
        }
        debug!(
            intent = %intent.intent,
            requested = plan.len(),
            gathered = bundle.len(),
            "evidence gathered"
        );
        bundle
    }

    async fn fetch(
        &self,
        section: Section,
        query: &str,
        intent: &IntentResult,
    ) -> Result<Value, KestrelError> {
        match section {
            Section::Statistics => {
                let period = period_of(intent).unwrap_or_default();
                let stats = self.records.get_statistics(period).await?;
                to_value(&PeriodStatistics { period, stats })
            }
            Section::FailAnalysis => to_value(&self.records.get_fail_analysis().await?),
            Section::RecentContext => to_value(&self.records.get_recent(RECENT_CONTEXT_LIMIT).await?),
            Section::Details => {
                let filter = filter_for(intent, period_of(intent), DETAIL_LIMIT);
                to_value(&self.records.query(&filter).await?)
            }
            Section::RecentItems => {
                let filter = filter_for(intent, period_of(intent), RECENT_ITEMS_LIMIT);
                let records = if is_unconstrained(&filter) {
                    self.records.get_recent(RECENT_ITEMS_LIMIT).await?
                } else {
                    self.records.query(&filter).await?
                };
                to_value(&records)
            }
            Section::Documents => {
                let hits = self.documents.search(query).await?;
                to_value(&hits)
            }
            Section::LongTermInsights | Section::SimilarRecords | Section::ToolObservations => {
                Err(KestrelError::Internal(format!(
                    "section {section} is not gathered from collaborators"
                )))
            }
        }
    }
}

/// The period named by the intent's time slot, if any.
pub fn period_of(intent: &IntentResult) -> Option<Period> {
    intent
        .entity(Slot::TimePeriod)
        .and_then(|p| Period::from_str(p).ok())
}

/// A record filter from the intent's device, station and result slots.
pub fn filter_for(intent: &IntentResult, period: Option<Period>, limit: usize) -> RecordFilter {
    RecordFilter {
        period,
        device_id: intent.entity(Slot::Device).map(str::to_string),
        station: intent.entity(Slot::Station).map(str::to_string),
        result: intent
            .entity(Slot::Result)
            .and_then(|r| Verdict::from_str(r).ok()),
        limit,
    }
}

fn is_unconstrained(filter: &RecordFilter) -> bool {
    filter.period.is_none()
        && filter.device_id.is_none()
        && filter.station.is_none()
        && filter.result.is_none()
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, KestrelError> {
    serde_json::to_value(value)
        .map_err(|e| KestrelError::Internal(format!("failed to encode evidence: {e}")))
}

/// Renders tool observations as an evidence section.
pub fn observations_section<'a>(observations: impl IntoIterator<Item = (&'a str, &'a str)>) -> Value {
    Value::Array(
        observations
            .into_iter()
            .map(|(tool, output)| json!({ "tool": tool, "output": output }))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{Entities, FailAnalysis, FailGroup, InspectionRecord};
    use kestrel_test_utils::{MockDocuments, MockRecordStore};

    fn intent(intent: Intent, entities: &[(Slot, &str)]) -> IntentResult {
        let entities: Entities = entities
            .iter()
            .map(|(slot, value)| (*slot, value.to_string()))
            .collect();
        IntentResult::new(intent, entities, false)
    }

    fn record(id: i64, device: &str, result: Verdict) -> InspectionRecord {
        InspectionRecord {
            id,
            timestamp: format!("2026-10-16T08:{id:02}:00"),
            device_id: device.to_string(),
            image_id: None,
            result,
            station: "STA_01".to_string(),
        }
    }

    fn store() -> MockRecordStore {
        MockRecordStore::new()
            .with_statistics(Period::Today, Statistics::from_counts(7, 5, 2))
            .with_statistics(Period::Week, Statistics::from_counts(40, 30, 10))
            .with_records(vec![
                record(3, "Camera_03", Verdict::Fail),
                record(2, "Basler_GigE", Verdict::Pass),
                record(1, "Camera_03", Verdict::Pass),
            ])
            .with_fail_analysis(FailAnalysis {
                groups: vec![FailGroup {
                    device_id: "Camera_03".into(),
                    station: "STA_01".into(),
                    fail_count: 2,
                    first_fail: "2026-10-16T08:01:00".into(),
                    last_fail: "2026-10-16T08:03:00".into(),
                }],
            })
    }

    fn gatherer(records: MockRecordStore, documents: MockDocuments) -> EvidenceGatherer {
        EvidenceGatherer::new(Arc::new(records), Arc::new(documents))
    }

    #[test]
    fn dispatch_table() {
        assert_eq!(EvidenceGatherer::plan(Intent::Count), &[Section::Statistics]);
        assert_eq!(
            EvidenceGatherer::plan(Intent::Summary),
            &[Section::Statistics, Section::Details]
        );
        assert_eq!(
            EvidenceGatherer::plan(Intent::Analyze),
            EvidenceGatherer::plan(Intent::Summary)
        );
        assert_eq!(EvidenceGatherer::plan(Intent::Latest), &[Section::RecentItems]);
        assert_eq!(EvidenceGatherer::plan(Intent::Detail), &[Section::RecentItems]);
        assert!(EvidenceGatherer::plan(Intent::Troubleshoot).contains(&Section::FailAnalysis));
        assert!(EvidenceGatherer::plan(Intent::Troubleshoot).contains(&Section::Documents));
    }

    #[tokio::test]
    async fn count_gathers_statistics_for_named_period() {
        let gatherer = gatherer(store(), MockDocuments::default());
        let bundle = gatherer
            .gather("how many this week", &intent(Intent::Count, &[(Slot::TimePeriod, "week")]))
            .await;
        let stats = bundle.statistics().unwrap();
        assert_eq!(stats.period, Period::Week);
        assert_eq!(stats.stats.total, 40);
        assert_eq!(bundle.len(), 1);
    }

    #[tokio::test]
    async fn count_defaults_to_today() {
        let gatherer = gatherer(store(), MockDocuments::default());
        let bundle = gatherer.gather("how many", &intent(Intent::Count, &[])).await;
        let stats = bundle.statistics().unwrap();
        assert_eq!(stats.period, Period::Today);
        assert_eq!(stats.stats.pass, 5);
    }

    #[tokio::test]
    async fn troubleshoot_gathers_all_sections() {
        let documents = MockDocuments::new(vec![kestrel_core::DocumentHit {
            source: "camera.md".into(),
            excerpt: "Clean the lens".into(),
            score: 1,
        }]);
        let gatherer = gatherer(store(), documents);
        let bundle = gatherer
            .gather("why did camera fail", &intent(Intent::Troubleshoot, &[]))
            .await;
        for section in EvidenceGatherer::plan(Intent::Troubleshoot) {
            assert!(bundle.contains(*section), "missing {section}");
        }
        assert_eq!(bundle.get(Section::RecentContext).unwrap().as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failures_leave_sections_absent() {
        let gatherer = gatherer(MockRecordStore::unavailable(), MockDocuments::unavailable());
        let bundle = gatherer
            .gather("why", &intent(Intent::Troubleshoot, &[]))
            .await;
        assert!(bundle.is_empty());
        assert!(bundle.statistics().is_none());
    }

    #[tokio::test]
    async fn partial_failure_keeps_other_sections() {
        let gatherer = gatherer(store(), MockDocuments::unavailable());
        let bundle = gatherer
            .gather("why", &intent(Intent::Troubleshoot, &[]))
            .await;
        assert!(!bundle.contains(Section::Documents));
        assert!(bundle.contains(Section::FailAnalysis));
    }

    #[tokio::test]
    async fn latest_applies_entity_filters() {
        let gatherer = gatherer(store(), MockDocuments::default());
        let bundle = gatherer
            .gather(
                "latest Camera_03",
                &intent(Intent::Latest, &[(Slot::Device, "Camera_03")]),
            )
            .await;
        let items = bundle.get(Section::RecentItems).unwrap().as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|r| r["device_id"] == "Camera_03"));
    }

    #[test]
    fn prompt_rendering_marks_empty_and_truncated() {
        assert!(EvidenceBundle::new().render_for_prompt(100).contains("no evidence"));

        let mut bundle = EvidenceBundle::new();
        bundle.insert(Section::Details, json!(vec!["x".repeat(50); 10]));
        let rendered = bundle.render_for_prompt(40);
        assert!(rendered.ends_with("(truncated)"));
    }

    #[test]
    fn bundle_serializes_with_section_keys() {
        let mut bundle = EvidenceBundle::new();
        bundle.insert(Section::FailAnalysis, json!({ "groups": [] }));
        assert_eq!(bundle.to_json_string(), r#"{"fail_analysis":{"groups":[]}}"#);
    }
}
