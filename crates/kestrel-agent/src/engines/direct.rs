// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template answers straight from the evidence bundle.
//!
//! [`DirectEngine::render`] is also the fallback every other engine uses
//! when the model backend is unavailable.

use async_trait::async_trait;
use kestrel_core::text::truncate_chars;
use kestrel_core::{DocumentHit, FailAnalysis, InspectionRecord, Intent, IntentResult};
use kestrel_router::ReasoningMode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Draft, EngineInput, INSUFFICIENT_DATA, ModelHandle, PROMPT_EVIDENCE_CHARS, Reasoner};
use crate::evidence::{EvidenceBundle, EvidenceGatherer, PeriodStatistics, Section};

/// Records listed per record section.
const LISTED_RECORDS: usize = 10;

/// Excerpt characters shown per document hit.
const EXCERPT_CHARS: usize = 200;

/// Formats evidence with a fixed template per intent.
///
/// With a model attached, a corrective pass makes one revision call over
/// the template and the reflection feedback.
#[derive(Clone, Default)]
pub struct DirectEngine {
    model: Option<ModelHandle>,
}

impl DirectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: ModelHandle) -> Self {
        Self { model: Some(model) }
    }

    /// Renders the evidence for `intent`. Absent sections are named as
    /// unknown; an empty bundle yields the insufficient-data answer.
    pub fn render(intent: &IntentResult, evidence: &EvidenceBundle) -> String {
        if evidence.is_empty() {
            return INSUFFICIENT_DATA.to_string();
        }

        let mut blocks = vec![format!("{}:", title(intent.intent))];
        for section in evidence.sections() {
            if let Some(value) = evidence.get(section)
                && let Some(block) = render_section(section, value)
            {
                blocks.push(block);
            }
        }

        let missing: Vec<String> = EvidenceGatherer::plan(intent.intent)
            .iter()
            .filter(|s| !evidence.contains(**s))
            .map(|s| s.to_string().replace('_', " "))
            .collect();
        if !missing.is_empty() {
            blocks.push(format!(
                "(Unavailable: {}. Treat these as unknown.)",
                missing.join(", ")
            ));
        }
        blocks.join("\n\n")
    }

    fn revision_prompt(input: &EngineInput<'_>, template: &str) -> String {
        format!(
            "Revise the answer below so it addresses the listed issues. Use only facts \
             from the evidence.\n\nQuestion: {}\n\nEvidence (JSON):\n{}\n\n{}Answer to revise:\n{}\n",
            input.query,
            input.evidence.render_for_prompt(PROMPT_EVIDENCE_CHARS),
            input.prompt_extras(),
            template
        )
    }
}

#[async_trait]
impl Reasoner for DirectEngine {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Direct
    }

    async fn reason(&self, input: &EngineInput<'_>) -> Draft {
        let template = Self::render(input.intent, input.evidence);
        let draft = Draft::new(template.clone(), ReasoningMode::Direct);

        let Some(model) = self.model.as_ref().filter(|_| input.is_correction()) else {
            debug!(intent = %input.intent.intent, "direct answer rendered");
            return draft;
        };
        if input.evidence.is_empty() {
            return draft;
        }

        match model.complete(&Self::revision_prompt(input, &template)).await {
            Ok(revised) if !revised.trim().is_empty() => {
                Draft::new(revised.trim(), ReasoningMode::Direct).with_calls(1)
            }
            Ok(_) => draft.with_calls(1).degraded(),
            Err(e) => {
                warn!(error = %e, "revision call failed, keeping template answer");
                draft.with_calls(1).degraded()
            }
        }
    }
}

fn title(intent: Intent) -> &'static str {
    match intent {
        Intent::Count => "Inspection count",
        Intent::Latest => "Latest inspections",
        Intent::Detail => "Inspection details",
        Intent::Summary => "Inspection summary",
        Intent::Analyze => "Inspection analysis",
        Intent::Troubleshoot => "Failure investigation",
    }
}

fn render_section(section: Section, value: &Value) -> Option<String> {
    match section {
        Section::Statistics => {
            let stats: PeriodStatistics = serde_json::from_value(value.clone()).ok()?;
            Some(render_statistics(&stats))
        }
        Section::FailAnalysis => {
            let analysis: FailAnalysis = serde_json::from_value(value.clone()).ok()?;
            Some(render_fail_analysis(&analysis))
        }
        Section::RecentContext | Section::Details | Section::RecentItems => {
            let records: Vec<InspectionRecord> = serde_json::from_value(value.clone()).ok()?;
            let heading = match section {
                Section::RecentContext => "Recent inspections",
                Section::Details => "Matching records",
                _ => "Records",
            };
            Some(render_records(heading, &records))
        }
        Section::Documents => {
            let hits: Vec<DocumentHit> = serde_json::from_value(value.clone()).ok()?;
            (!hits.is_empty()).then(|| render_documents(&hits))
        }
        Section::LongTermInsights => render_texts("Previously learned", value),
        Section::SimilarRecords => render_similar(value),
        Section::ToolObservations => render_observations(value),
    }
}

pub(crate) fn render_statistics(stats: &PeriodStatistics) -> String {
    let s = &stats.stats;
    if s.total == 0 {
        return format!("No inspections recorded ({}).", stats.period);
    }
    format!(
        "Statistics ({}):\n- Total: {}\n- PASS: {}\n- FAIL: {}\n- Pass rate: {:.1}%",
        stats.period, s.total, s.pass, s.fail, s.pass_rate
    )
}

fn render_fail_analysis(analysis: &FailAnalysis) -> String {
    if analysis.groups.is_empty() {
        return "No failures recorded today.".to_string();
    }
    let mut out = format!(
        "Failures today by device ({} total):",
        analysis.total_failures()
    );
    for group in &analysis.groups {
        out.push_str(&format!(
            "\n- {} at {}: {} failures (first {}, last {})",
            group.device_id, group.station, group.fail_count, group.first_fail, group.last_fail
        ));
    }
    out
}

fn render_records(heading: &str, records: &[InspectionRecord]) -> String {
    if records.is_empty() {
        return format!("{heading}: no inspection records found.");
    }
    let mut out = format!("{heading} ({}):", records.len());
    for (i, record) in records.iter().take(LISTED_RECORDS).enumerate() {
        out.push_str(&format!(
            "\n{}. {} {} at {}: {}",
            i + 1,
            record.timestamp,
            record.device_id,
            record.station,
            record.result.to_string().to_uppercase()
        ));
    }
    if records.len() > LISTED_RECORDS {
        out.push_str(&format!("\n... and {} more", records.len() - LISTED_RECORDS));
    }
    out
}

fn render_documents(hits: &[DocumentHit]) -> String {
    let mut out = "Related documentation:".to_string();
    for hit in hits {
        out.push_str(&format!(
            "\n- {}: {}",
            hit.source,
            truncate_chars(&hit.excerpt.replace('\n', " "), EXCERPT_CHARS)
        ));
    }
    out
}

fn render_texts(heading: &str, value: &Value) -> Option<String> {
    let texts: Vec<&str> = ["insights", "patterns"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }
    let mut out = format!("{heading}:");
    for text in texts {
        out.push_str("\n- ");
        out.push_str(text);
    }
    Some(out)
}

fn render_similar(value: &Value) -> Option<String> {
    let hits = value.as_array().filter(|h| !h.is_empty())?;
    let mut out = "Similar past records:".to_string();
    for hit in hits {
        out.push_str(&format!(
            "\n- #{} {} {} at {}",
            hit["id"],
            hit["device_id"].as_str().unwrap_or_default(),
            hit["result"].as_str().unwrap_or_default().to_uppercase(),
            hit["station"].as_str().unwrap_or_default()
        ));
    }
    Some(out)
}

fn render_observations(value: &Value) -> Option<String> {
    let items = value.as_array().filter(|o| !o.is_empty())?;
    let mut out = "Tool results:".to_string();
    for item in items {
        out.push_str(&format!(
            "\n- {}: {}",
            item["tool"].as_str().unwrap_or_default(),
            truncate_chars(item["output"].as_str().unwrap_or_default(), EXCERPT_CHARS)
        ));
    }
    Some(out)
}
