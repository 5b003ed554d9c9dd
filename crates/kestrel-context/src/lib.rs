// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-term conversation memory for a Kestrel session.
//!
//! Holds a fixed-capacity buffer of recent exchanges (oldest evicted first)
//! plus a sticky [`WorkingMemory`] of entity slots. Follow-up queries are
//! enriched with the working memory before they reach the classifier.

pub mod followup;
pub mod working;

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kestrel_config::model::ContextConfig;
use kestrel_core::text::truncate_chars;
use kestrel_core::{Entities, IntentResult};
use kestrel_router::IntentClassifier;
use serde::Serialize;
use tracing::debug;

pub use working::WorkingMemory;

/// Exchanges rendered into prompts.
const PROMPT_EXCHANGES: usize = 5;

/// Answer characters kept per exchange in prompts.
const PROMPT_ANSWER_CHARS: usize = 200;

/// A query as received plus the text actually sent to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedQuery {
    pub original: String,
    pub effective: String,
    pub followup: bool,
}

impl EnrichedQuery {
    /// A query passed through without enrichment.
    pub fn plain(text: &str) -> Self {
        Self {
            original: text.to_string(),
            effective: text.to_string(),
            followup: false,
        }
    }
}

/// One recorded question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationExchange {
    pub user_text: String,
    pub effective_text: String,
    pub answer: String,
    pub intent: IntentResult,
    pub followup: bool,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of buffer usage for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStats {
    pub total_exchanges: usize,
    pub capacity: usize,
    pub working_memory: Entities,
    pub intents_seen: Vec<String>,
}

/// Fixed-capacity conversation buffer with sticky working memory.
pub struct ContextMemory {
    capacity: usize,
    max_prompt_chars: usize,
    exchanges: VecDeque<ConversationExchange>,
    working: WorkingMemory,
    classifier: Arc<IntentClassifier>,
}

impl ContextMemory {
    /// Creates an empty memory. A zero capacity is treated as one.
    pub fn new(capacity: usize, max_prompt_chars: usize, classifier: Arc<IntentClassifier>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            max_prompt_chars,
            exchanges: VecDeque::with_capacity(capacity),
            working: WorkingMemory::new(),
            classifier,
        }
    }

    pub fn from_config(config: &ContextConfig, classifier: Arc<IntentClassifier>) -> Self {
        Self::new(config.capacity, config.max_prompt_chars, classifier)
    }

    /// Enriches a follow-up query with the current working memory.
    ///
    /// Non-follow-ups, and follow-ups arriving while working memory is
    /// empty, pass through unchanged.
    pub fn enrich_query(&self, raw_text: &str) -> EnrichedQuery {
        let raw_intent = self.classifier.classify(raw_text);
        if !followup::is_followup(raw_text, &raw_intent) {
            return EnrichedQuery::plain(raw_text);
        }

        match self.working.render() {
            Some(rendered) => {
                debug!(slots = self.working.slots().len(), "enriching follow-up query");
                EnrichedQuery {
                    original: raw_text.to_string(),
                    effective: format!("{raw_text}\n\n[Context: {rendered}]"),
                    followup: true,
                }
            }
            None => EnrichedQuery {
                followup: true,
                ..EnrichedQuery::plain(raw_text)
            },
        }
    }

    /// Records an exchange, evicting the oldest when full, and overwrites
    /// working-memory slots with the entities in `intent`.
    pub fn add_exchange(&mut self, query: &EnrichedQuery, answer: &str, intent: &IntentResult) {
        if self.exchanges.len() == self.capacity {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(ConversationExchange {
            user_text: query.original.clone(),
            effective_text: query.effective.clone(),
            answer: answer.to_string(),
            intent: intent.clone(),
            followup: query.followup,
            timestamp: Utc::now(),
        });
        self.working.update(&intent.entities);
    }

    /// Exchanges oldest first.
    pub fn exchanges(&self) -> impl Iterator<Item = &ConversationExchange> {
        self.exchanges.iter()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working
    }

    /// Renders recent exchanges and working memory for inclusion in a prompt.
    pub fn format_for_prompt(&self) -> String {
        if self.exchanges.is_empty() && self.working.is_empty() {
            return "No previous context.".to_string();
        }

        let mut parts = Vec::new();
        if !self.exchanges.is_empty() {
            parts.push("Recent conversation:".to_string());
            let skip = self.exchanges.len().saturating_sub(PROMPT_EXCHANGES);
            for exchange in self.exchanges.iter().skip(skip) {
                parts.push(format!("User: {}", exchange.user_text));
                parts.push(format!(
                    "Assistant: {}",
                    truncate_chars(&exchange.answer, PROMPT_ANSWER_CHARS)
                ));
            }
        }
        if let Some(rendered) = self.working.render() {
            parts.push(format!("Working memory: {rendered}"));
        }
        parts.push(format!("Summary: {}", self.summary_line()));

        truncate_chars(&parts.join("\n"), self.max_prompt_chars).to_string()
    }

    fn summary_line(&self) -> String {
        let topics = self.intents_seen();
        if topics.is_empty() {
            format!("{} exchanges", self.exchanges.len())
        } else {
            format!(
                "{} exchanges, topics: {}",
                self.exchanges.len(),
                topics.join(", ")
            )
        }
    }

    fn intents_seen(&self) -> Vec<String> {
        self.exchanges
            .iter()
            .map(|e| e.intent.intent.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            total_exchanges: self.exchanges.len(),
            capacity: self.capacity,
            working_memory: self.working.slots().clone(),
            intents_seen: self.intents_seen(),
        }
    }

    /// Drops every exchange and working-memory slot.
    pub fn clear(&mut self) {
        self.exchanges.clear();
        self.working.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{Intent, Slot};
    use proptest::prelude::*;

    fn memory(capacity: usize) -> ContextMemory {
        ContextMemory::new(capacity, 4000, Arc::new(IntentClassifier::default()))
    }

    fn intent_with(entities: &[(Slot, &str)]) -> IntentResult {
        IntentResult::new(
            Intent::Count,
            entities.iter().map(|(s, v)| (*s, v.to_string())).collect(),
            false,
        )
    }

    fn add(memory: &mut ContextMemory, text: &str) {
        memory.add_exchange(&EnrichedQuery::plain(text), "answer", &intent_with(&[]));
    }

    #[test]
    fn eleven_exchanges_into_capacity_ten() {
        let mut memory = memory(10);
        for i in 1..=11 {
            add(&mut memory, &format!("q{i}"));
        }
        let texts: Vec<&str> = memory.exchanges().map(|e| e.user_text.as_str()).collect();
        let expected: Vec<String> = (2..=11).map(|i| format!("q{i}")).collect();
        assert_eq!(texts, expected);
        assert!(!texts.contains(&"q1"));
    }

    #[test]
    fn followup_is_enriched_from_working_memory() {
        let mut memory = memory(10);
        memory.add_exchange(
            &EnrichedQuery::plain("how many fails on Camera_03 today"),
            "2",
            &intent_with(&[(Slot::Device, "Camera_03"), (Slot::TimePeriod, "today")]),
        );

        let enriched = memory.enrich_query("what about yesterday");
        assert!(enriched.followup);
        assert_eq!(enriched.original, "what about yesterday");
        assert_eq!(
            enriched.effective,
            "what about yesterday\n\n[Context: device: Camera_03, time period: today]"
        );
    }

    #[test]
    fn self_contained_query_passes_through() {
        let mut memory = memory(10);
        memory.add_exchange(
            &EnrichedQuery::plain("q"),
            "a",
            &intent_with(&[(Slot::Device, "Camera_03")]),
        );
        let enriched = memory.enrich_query("how many inspections on Basler_GigE during the week");
        assert!(!enriched.followup);
        assert_eq!(enriched.effective, enriched.original);
    }

    #[test]
    fn followup_with_empty_working_memory_is_unchanged() {
        let memory = memory(10);
        let enriched = memory.enrich_query("and that one?");
        assert!(enriched.followup);
        assert_eq!(enriched.effective, "and that one?");
    }

    #[test]
    fn working_memory_is_sticky_across_exchanges() {
        let mut memory = memory(10);
        memory.add_exchange(
            &EnrichedQuery::plain("a"),
            "a",
            &intent_with(&[(Slot::Device, "Camera_03"), (Slot::Station, "STA_580")]),
        );
        memory.add_exchange(
            &EnrichedQuery::plain("b"),
            "b",
            &intent_with(&[(Slot::Device, "Watashi_cam")]),
        );
        assert_eq!(memory.working_memory().get(Slot::Device), Some("Watashi_cam"));
        assert_eq!(memory.working_memory().get(Slot::Station), Some("STA_580"));
    }

    #[test]
    fn prompt_rendering_is_truncated() {
        let mut memory = ContextMemory::new(10, 50, Arc::new(IntentClassifier::default()));
        for i in 0..5 {
            memory.add_exchange(
                &EnrichedQuery::plain(&format!("question number {i}")),
                &"x".repeat(300),
                &intent_with(&[]),
            );
        }
        assert_eq!(memory.format_for_prompt().chars().count(), 50);
    }

    #[test]
    fn prompt_rendering_shows_last_five() {
        let mut memory = memory(10);
        for i in 1..=7 {
            add(&mut memory, &format!("question {i}"));
        }
        let rendered = memory.format_for_prompt();
        assert!(!rendered.contains("question 2\n"));
        assert!(rendered.contains("question 3"));
        assert!(rendered.contains("question 7"));
        assert!(rendered.contains("7 exchanges, topics: count"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut memory = memory(3);
        memory.add_exchange(
            &EnrichedQuery::plain("a"),
            "a",
            &intent_with(&[(Slot::Device, "Camera_03")]),
        );
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.working_memory().is_empty());
        assert_eq!(memory.format_for_prompt(), "No previous context.");
    }

    #[test]
    fn stats_report_usage() {
        let mut memory = memory(4);
        add(&mut memory, "one");
        let stats = memory.stats();
        assert_eq!(stats.total_exchanges, 1);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.intents_seen, vec!["count"]);
    }

    proptest! {
        #[test]
        fn buffer_never_exceeds_capacity(capacity in 1usize..20, adds in 0usize..60) {
            let mut memory = memory(capacity);
            for i in 0..adds {
                add(&mut memory, &format!("q{i}"));
                prop_assert!(memory.len() <= capacity);
            }
            let first = adds.saturating_sub(capacity);
            let texts: Vec<String> = memory.exchanges().map(|e| e.user_text.clone()).collect();
            let expected: Vec<String> = (first..adds).map(|i| format!("q{i}")).collect();
            prop_assert_eq!(texts, expected);
        }
    }
}
