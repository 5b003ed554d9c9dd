// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types for the long-term memory system.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a stored insight or pattern came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Extracted by the language model during summarization.
    Summarization,
    /// Derived by counting heuristics when the model was unavailable.
    Heuristic,
    /// Added explicitly through the manual entry points.
    Manual,
}

impl MemorySource {
    /// Returns the string representation used in snapshots and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::Summarization => "summarization",
            MemorySource::Heuristic => "heuristic",
            MemorySource::Manual => "manual",
        }
    }
}

/// A distilled statement learned from conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub text: String,
    pub topic: String,
    /// In [0, 1].
    pub confidence: f64,
    pub source: MemorySource,
    pub created_at: DateTime<Utc>,
}

/// A recurring behaviour observed across conversations.
///
/// Patterns share the insight shape; the topic is always `"pattern"` unless
/// the producer supplied one.
pub type Pattern = Insight;

/// Topic assigned to patterns that arrive without one.
pub const PATTERN_TOPIC: &str = "pattern";

/// Granularity of a period summary, chosen from the elapsed time covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTier {
    Daily,
    Weekly,
    Monthly,
}

impl SummaryTier {
    /// Picks the tier for a window spanning `elapsed`.
    pub fn for_span(elapsed: chrono::Duration) -> Self {
        if elapsed < chrono::Duration::days(1) {
            SummaryTier::Daily
        } else if elapsed < chrono::Duration::days(7) {
            SummaryTier::Weekly
        } else {
            SummaryTier::Monthly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryTier::Daily => "daily",
            SummaryTier::Weekly => "weekly",
            SummaryTier::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for SummaryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One summarization pass over a window of exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub tier: SummaryTier,
    pub summary: String,
    pub conversation_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Everything a summarization pass produced, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub summary: PeriodSummary,
    pub insights: Vec<Insight>,
    pub patterns: Vec<Pattern>,
}

/// Full persisted state of a [`LongTermMemory`](crate::LongTermMemory).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub summaries: Vec<PeriodSummary>,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

/// Memories relevant to one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelevantMemories {
    pub insights: Vec<Insight>,
    pub patterns: Vec<Pattern>,
    pub recent_summary: Option<PeriodSummary>,
}

impl RelevantMemories {
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty() && self.patterns.is_empty() && self.recent_summary.is_none()
    }
}

/// Read-side view grouping current knowledge for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeView {
    /// Insight texts keyed by topic.
    pub by_topic: BTreeMap<String, Vec<String>>,
    /// Most frequent patterns as `"text (seen Nx)"`.
    pub frequent_patterns: Vec<String>,
    pub recent_summaries: Vec<PeriodSummary>,
}

/// Counters reported by [`LongTermMemory::stats`](crate::LongTermMemory::stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongTermStats {
    pub insights: usize,
    pub patterns: usize,
    pub summaries: usize,
    pub topics: Vec<String>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    dot / denom
}
