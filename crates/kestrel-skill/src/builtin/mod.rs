// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools over the record store and document corpus.

pub mod calculate;
pub mod docs;
pub mod query;
pub mod stats;

pub use calculate::CalculateTool;
pub use docs::SearchDocsTool;
pub use query::QueryDatabaseTool;
pub use stats::{AnalyzeTrendTool, CompareTool, GetStatisticsTool};

use std::str::FromStr;
use std::sync::Arc;

use kestrel_core::text::truncate_chars;
use kestrel_core::{DocumentSearch, Period, RecordStore};
use kestrel_router::IntentClassifier;

use crate::ToolRegistry;

/// Registers all six built-in tools into the given registry.
///
/// `observation_chars` bounds the text returned by the record and document
/// lookups.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    records: Arc<dyn RecordStore>,
    documents: Arc<dyn DocumentSearch>,
    classifier: Arc<IntentClassifier>,
    observation_chars: usize,
) {
    registry.register(Arc::new(QueryDatabaseTool::new(
        records.clone(),
        classifier,
        observation_chars,
    )));
    registry.register(Arc::new(SearchDocsTool::new(documents, observation_chars)));
    registry.register(Arc::new(GetStatisticsTool::new(records.clone())));
    registry.register(Arc::new(CalculateTool::new(records.clone())));
    registry.register(Arc::new(CompareTool::new(records.clone())));
    registry.register(Arc::new(AnalyzeTrendTool::new(records)));
}

/// Clips `text` to `max_chars`, marking the cut with `...`.
pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    let clipped = truncate_chars(text, max_chars);
    if clipped.len() < text.len() {
        format!("{clipped}...")
    } else {
        text.to_string()
    }
}

/// Reads a period from tool input: a bare period name, else the first
/// period mentioned, else `default`.
pub(crate) fn period_from_input(input: &str, default: Period) -> Period {
    let trimmed = input.trim().trim_matches(|c: char| c == '"' || c == '\'');
    Period::from_str(trimmed)
        .ok()
        .or_else(|| IntentClassifier::periods_in(input).first().copied())
        .unwrap_or(default)
}

/// Rounds a percentage to one decimal place for display.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolName;
    use kestrel_test_utils::{MockDocuments, MockRecordStore};

    #[test]
    fn register_builtins_registers_exactly_6_tools() {
        let mut registry = ToolRegistry::new();
        register_builtins(
            &mut registry,
            Arc::new(MockRecordStore::new()),
            Arc::new(MockDocuments::default()),
            Arc::new(IntentClassifier::default()),
            500,
        );
        assert_eq!(registry.len(), 6);
        assert!(registry.missing().is_empty());
        assert!(registry.get(ToolName::Answer).is_none());
    }

    #[test]
    fn period_parsing_from_input() {
        assert_eq!(period_from_input("week", Period::Today), Period::Week);
        assert_eq!(period_from_input("\"MONTH\"", Period::Today), Period::Month);
        assert_eq!(
            period_from_input("stats for yesterday please", Period::Today),
            Period::Yesterday
        );
        assert_eq!(period_from_input("", Period::Week), Period::Week);
        assert_eq!(period_from_input("all", Period::Today), Period::All);
    }

    #[test]
    fn clip_marks_truncation() {
        assert_eq!(clip("abcdef", 3), "abc...");
        assert_eq!(clip("abc", 3), "abc");
    }
}
