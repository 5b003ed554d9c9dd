// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification and reasoning-mode selection for Kestrel.
//!
//! This crate provides:
//! - [`IntentClassifier`]: bilingual keyword classification with entity extraction
//! - [`ModeSelector`]: deterministic choice of reasoning engine per classified query

pub mod classifier;
pub mod router;

pub use classifier::{IntentClassifier, keyword_matches};
pub use router::{ModeSelector, ReasoningMode, RoutingDecision};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn classification_is_total_and_consistent(text in "\\PC{0,60}") {
            let result = IntentClassifier::default().classify(&text);
            prop_assert_eq!(result.complexity, result.intent.complexity());
            prop_assert_eq!(
                result.requires_reasoning,
                result.complexity != kestrel_core::Complexity::Simple
            );
        }

        #[test]
        fn classification_is_deterministic(text in "[a-z ]{0,40}") {
            let classifier = IntentClassifier::default();
            prop_assert_eq!(classifier.classify(&text), classifier.classify(&text));
        }
    }
}
