// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distills a window of conversation exchanges into a period summary,
//! insights, and patterns.
//!
//! The model is asked for a single JSON object. When the backend is
//! unreachable or the reply cannot be parsed, counting heuristics over the
//! exchange metadata produce the outcome instead, so a summarization pass
//! always yields a summary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kestrel_context::ConversationExchange;
use kestrel_core::json::parse_object;
use kestrel_core::text::truncate_chars;
use kestrel_core::{CompletionAdapter, KestrelError, Slot, complete_within};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{
    Insight, MemorySource, PATTERN_TOPIC, Pattern, PeriodSummary, SummaryOutcome, SummaryTier,
};

/// Exchanges included in the summarization prompt.
pub const SUMMARY_WINDOW: usize = 20;

/// Answer characters kept per exchange in the prompt.
const PROMPT_ANSWER_CHARS: usize = 100;

/// Follow-up share above which a pattern is recorded.
const FOLLOWUP_PATTERN_RATE: f64 = 0.3;

/// Mentions needed for a device insight.
const DEVICE_INSIGHT_MENTIONS: usize = 2;

/// Mentions needed for a device focus pattern.
const DEVICE_PATTERN_MENTIONS: usize = 3;

#[derive(Debug, Deserialize)]
struct ModelSummary {
    summary: String,
    #[serde(default)]
    insights: Vec<ModelInsight>,
    #[serde(default)]
    patterns: Vec<ModelPattern>,
}

#[derive(Debug, Deserialize)]
struct ModelInsight {
    text: String,
    #[serde(default = "default_topic")]
    topic: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ModelPattern {
    text: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_topic() -> String {
    "general".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Runs summarization passes against a completion backend.
pub struct Summarizer {
    completion: Arc<dyn CompletionAdapter>,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(completion: Arc<dyn CompletionAdapter>, timeout: Duration) -> Self {
        Self {
            completion,
            timeout,
        }
    }

    /// Summarizes the last [`SUMMARY_WINDOW`] exchanges of `exchanges`.
    pub async fn summarize(&self, exchanges: &[ConversationExchange]) -> SummaryOutcome {
        let skip = exchanges.len().saturating_sub(SUMMARY_WINDOW);
        let window = &exchanges[skip..];
        let tier = tier_for(window);

        let prompt = build_prompt(window);
        match complete_within(self.completion.as_ref(), &prompt, self.timeout).await {
            Ok(response) => match parse_summary_response(&response, tier, window.len()) {
                Ok(outcome) => {
                    debug!(
                        tier = %tier,
                        insights = outcome.insights.len(),
                        patterns = outcome.patterns.len(),
                        "model summarization succeeded"
                    );
                    outcome
                }
                Err(e) => {
                    warn!("Failed to parse summarization response: {e}");
                    debug!("Raw response: {response}");
                    heuristic_summary(window, tier)
                }
            },
            Err(e) => {
                warn!(error = %e, "summarization model unavailable, using heuristics");
                heuristic_summary(window, tier)
            }
        }
    }
}

/// Tier from the span between the first and last exchange.
pub fn tier_for(window: &[ConversationExchange]) -> SummaryTier {
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => SummaryTier::for_span(last.timestamp - first.timestamp),
        _ => SummaryTier::Daily,
    }
}

fn build_prompt(window: &[ConversationExchange]) -> String {
    let conversation = window
        .iter()
        .map(|e| {
            format!(
                "User: {}\nAssistant: {}",
                e.user_text,
                truncate_chars(&e.answer, PROMPT_ANSWER_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze these conversations about inspection data and extract:
1. A brief summary of the topics discussed.
2. Key insights learned about the devices, stations, and results.
3. Patterns in what the user asks about.

Conversations:
{conversation}

Return ONLY a JSON object of the form:
{{"summary": "...", "insights": [{{"text": "...", "topic": "...", "confidence": 0.8}}], "patterns": [{{"text": "...", "confidence": 0.7}}]}}"#
    )
}

/// Parses the model's JSON reply into a [`SummaryOutcome`].
///
/// Blank summaries are rejected; blank insight or pattern texts are dropped
/// and confidences are clamped to `[0, 1]`.
pub fn parse_summary_response(
    response: &str,
    tier: SummaryTier,
    conversation_count: usize,
) -> Result<SummaryOutcome, KestrelError> {
    let parsed: ModelSummary = parse_object(response)?;
    if parsed.summary.trim().is_empty() {
        return Err(KestrelError::MalformedOutput("empty summary".into()));
    }

    let now = Utc::now();
    let insights = parsed
        .insights
        .into_iter()
        .filter(|i| !i.text.trim().is_empty())
        .map(|i| Insight {
            text: i.text.trim().to_string(),
            topic: i.topic,
            confidence: i.confidence.clamp(0.0, 1.0),
            source: MemorySource::Summarization,
            created_at: now,
        })
        .collect();
    let patterns = parsed
        .patterns
        .into_iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| Pattern {
            text: p.text.trim().to_string(),
            topic: PATTERN_TOPIC.to_string(),
            confidence: p.confidence.clamp(0.0, 1.0),
            source: MemorySource::Summarization,
            created_at: now,
        })
        .collect();

    Ok(SummaryOutcome {
        summary: PeriodSummary {
            tier,
            summary: parsed.summary.trim().to_string(),
            conversation_count,
            created_at: now,
        },
        insights,
        patterns,
    })
}

/// Counting heuristics used when the model cannot summarize.
pub fn heuristic_summary(window: &[ConversationExchange], tier: SummaryTier) -> SummaryOutcome {
    let now = Utc::now();
    let total = window.len();
    let mut insights = Vec::new();
    let mut patterns = Vec::new();

    let mut intent_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut device_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut followups = 0usize;
    for exchange in window {
        *intent_counts
            .entry(exchange.intent.intent.to_string())
            .or_default() += 1;
        if let Some(device) = exchange.intent.entity(Slot::Device) {
            *device_counts.entry(device).or_default() += 1;
        }
        if exchange.followup {
            followups += 1;
        }
    }

    let heuristic = |text: String, topic: &str, confidence: f64| Insight {
        text,
        topic: topic.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
        source: MemorySource::Heuristic,
        created_at: now,
    };

    let mut most_common: Option<(&str, usize)> = None;
    for (intent, count) in &intent_counts {
        if most_common.is_none_or(|(_, best)| *count > best) {
            most_common = Some((intent, *count));
        }
    }
    if let Some((intent, count)) = most_common {
        insights.push(heuristic(
            format!("Most common question type is {intent} ({count} of {total})"),
            "usage",
            count as f64 / total as f64,
        ));
    }

    for (device, count) in &device_counts {
        if *count >= DEVICE_INSIGHT_MENTIONS {
            insights.push(heuristic(
                format!("Device {device} was discussed {count} times"),
                "device",
                0.6,
            ));
        }
    }

    if total > 0 {
        let rate = followups as f64 / total as f64;
        if rate > FOLLOWUP_PATTERN_RATE {
            patterns.push(heuristic(
                format!(
                    "User frequently asks follow-up questions ({:.0}% of queries)",
                    rate * 100.0
                ),
                PATTERN_TOPIC,
                rate,
            ));
        }
    }

    for (device, count) in &device_counts {
        if *count >= DEVICE_PATTERN_MENTIONS {
            patterns.push(heuristic(
                format!("User repeatedly focuses on {device}"),
                PATTERN_TOPIC,
                0.7,
            ));
        }
    }

    SummaryOutcome {
        summary: PeriodSummary {
            tier,
            summary: format!("Summary of {total} conversations ({tier})"),
            conversation_count: total,
            created_at: now,
        },
        insights,
        patterns,
    }
}
