// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped long-term store of insights, patterns, and period summaries.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::Utc;
use kestrel_config::model::MemoryConfig;
use kestrel_core::text::tokenize;
use tracing::debug;

use crate::types::{
    Insight, KnowledgeView, LongTermStats, MemorySnapshot, MemorySource, PATTERN_TOPIC, Pattern,
    PeriodSummary, RelevantMemories, SummaryOutcome,
};

/// Patterns listed in the consolidated view.
const FREQUENT_PATTERNS: usize = 10;

/// Summaries listed in the consolidated view.
const RECENT_SUMMARIES: usize = 5;

/// Insights, patterns, and summaries with oldest-first eviction.
///
/// Each collection is an independent FIFO: once it holds `max_memories`
/// (or `max_summaries`) entries, every push evicts the oldest entry. The
/// retained set therefore depends only on insertion order.
#[derive(Debug, Clone)]
pub struct LongTermMemory {
    max_memories: usize,
    max_summaries: usize,
    insights: VecDeque<Insight>,
    patterns: VecDeque<Pattern>,
    summaries: VecDeque<PeriodSummary>,
}

impl LongTermMemory {
    /// Creates an empty store. Zero caps are treated as one.
    pub fn new(max_memories: usize, max_summaries: usize) -> Self {
        Self {
            max_memories: max_memories.max(1),
            max_summaries: max_summaries.max(1),
            insights: VecDeque::new(),
            patterns: VecDeque::new(),
            summaries: VecDeque::new(),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_memories, config.max_summaries)
    }

    /// Adds an insight with full confidence.
    pub fn add_insight(&mut self, text: &str, topic: &str, source: MemorySource) {
        self.push_insight(Insight {
            text: text.to_string(),
            topic: topic.to_string(),
            confidence: 1.0,
            source,
            created_at: Utc::now(),
        });
    }

    /// Adds a manually observed pattern.
    pub fn add_pattern(&mut self, text: &str, confidence: f64) {
        self.push_pattern(Pattern {
            text: text.to_string(),
            topic: PATTERN_TOPIC.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            source: MemorySource::Manual,
            created_at: Utc::now(),
        });
    }

    pub fn push_insight(&mut self, insight: Insight) {
        push_capped(&mut self.insights, insight, self.max_memories);
    }

    pub fn push_pattern(&mut self, pattern: Pattern) {
        push_capped(&mut self.patterns, pattern, self.max_memories);
    }

    pub fn record_summary(&mut self, summary: PeriodSummary) {
        push_capped(&mut self.summaries, summary, self.max_summaries);
    }

    /// Stores everything one summarization pass produced.
    pub fn apply(&mut self, outcome: SummaryOutcome) {
        debug!(
            tier = %outcome.summary.tier,
            insights = outcome.insights.len(),
            patterns = outcome.patterns.len(),
            "storing summarization outcome"
        );
        self.record_summary(outcome.summary);
        for insight in outcome.insights {
            self.push_insight(insight);
        }
        for pattern in outcome.patterns {
            self.push_pattern(pattern);
        }
    }

    /// Ranks insights and patterns by keyword overlap with `query`.
    pub fn get_relevant_memories(&self, query: &str, top_k: usize) -> RelevantMemories {
        let query_tokens: BTreeSet<String> = tokenize(query).into_iter().collect();
        self.get_relevant_memories_by(top_k, |text| {
            tokenize(text)
                .into_iter()
                .collect::<BTreeSet<_>>()
                .intersection(&query_tokens)
                .count() as f32
        })
    }

    /// Ranks insights and patterns with a caller-supplied similarity.
    ///
    /// Entries scoring zero or less are never returned. Equal scores keep the
    /// newer entry first.
    pub fn get_relevant_memories_by<F>(&self, top_k: usize, score: F) -> RelevantMemories
    where
        F: Fn(&str) -> f32,
    {
        RelevantMemories {
            insights: top_scoring(&self.insights, top_k, &score),
            patterns: top_scoring(&self.patterns, top_k, &score),
            recent_summary: self.summaries.back().cloned(),
        }
    }

    /// Groups current knowledge for presentation. Nothing is stored.
    pub fn consolidate_knowledge(&self) -> KnowledgeView {
        let mut by_topic: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for insight in &self.insights {
            by_topic
                .entry(insight.topic.clone())
                .or_default()
                .push(insight.text.clone());
        }

        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for pattern in &self.patterns {
            *frequency.entry(pattern.text.as_str()).or_default() += 1;
        }
        let mut frequent: Vec<(&str, usize)> = frequency.into_iter().collect();
        frequent.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let frequent_patterns = frequent
            .into_iter()
            .take(FREQUENT_PATTERNS)
            .map(|(text, count)| format!("{text} (seen {count}x)"))
            .collect();

        let skip = self.summaries.len().saturating_sub(RECENT_SUMMARIES);
        KnowledgeView {
            by_topic,
            frequent_patterns,
            recent_summaries: self.summaries.iter().skip(skip).cloned().collect(),
        }
    }

    /// Copies the full state for persistence.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            insights: self.insights.iter().cloned().collect(),
            patterns: self.patterns.iter().cloned().collect(),
            summaries: self.summaries.iter().cloned().collect(),
            saved_at: Utc::now(),
        }
    }

    /// Replaces the current state with `snapshot`.
    ///
    /// Snapshots larger than the configured caps keep their newest entries.
    pub fn restore(&mut self, snapshot: MemorySnapshot) {
        self.clear();
        for insight in snapshot.insights {
            self.push_insight(insight);
        }
        for pattern in snapshot.patterns {
            self.push_pattern(pattern);
        }
        for summary in snapshot.summaries {
            self.record_summary(summary);
        }
    }

    pub fn stats(&self) -> LongTermStats {
        let topics: BTreeSet<&str> = self.insights.iter().map(|i| i.topic.as_str()).collect();
        let timestamps = self
            .insights
            .iter()
            .chain(self.patterns.iter())
            .map(|m| m.created_at)
            .chain(self.summaries.iter().map(|s| s.created_at));
        let (oldest, newest) = timestamps.fold((None, None), |(lo, hi), ts| {
            (
                Some(lo.map_or(ts, |lo: chrono::DateTime<Utc>| lo.min(ts))),
                Some(hi.map_or(ts, |hi: chrono::DateTime<Utc>| hi.max(ts))),
            )
        });

        LongTermStats {
            insights: self.insights.len(),
            patterns: self.patterns.len(),
            summaries: self.summaries.len(),
            topics: topics.into_iter().map(str::to_string).collect(),
            oldest,
            newest,
        }
    }

    pub fn insights(&self) -> impl Iterator<Item = &Insight> {
        self.insights.iter()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn summaries(&self) -> impl Iterator<Item = &PeriodSummary> {
        self.summaries.iter()
    }

    pub fn max_memories(&self) -> usize {
        self.max_memories
    }

    pub fn is_empty(&self) -> bool {
        self.insights.is_empty() && self.patterns.is_empty() && self.summaries.is_empty()
    }

    pub fn clear(&mut self) {
        self.insights.clear();
        self.patterns.clear();
        self.summaries.clear();
    }
}

fn push_capped<T>(queue: &mut VecDeque<T>, item: T, cap: usize) {
    queue.push_back(item);
    while queue.len() > cap {
        queue.pop_front();
    }
}

fn top_scoring<F>(items: &VecDeque<Insight>, top_k: usize, score: &F) -> Vec<Insight>
where
    F: Fn(&str) -> f32,
{
    // Newest first so the stable sort keeps newer entries ahead on ties.
    let mut scored: Vec<(f32, &Insight)> = items
        .iter()
        .rev()
        .map(|item| (score(&item.text), item))
        .filter(|(s, _)| *s > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, item)| item.clone())
        .collect()
}
