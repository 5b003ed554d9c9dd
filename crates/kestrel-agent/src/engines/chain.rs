// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-call chain-of-thought reasoning.

use async_trait::async_trait;
use kestrel_router::ReasoningMode;
use tracing::{debug, warn};

use super::{Draft, EngineInput, ModelHandle, PROMPT_EVIDENCE_CHARS, Reasoner};
use crate::engines::direct::DirectEngine;

/// One model call producing four labeled sections: data summary,
/// patterns, probable cause and recommendations.
#[derive(Clone)]
pub struct ChainOfThoughtEngine {
    model: ModelHandle,
}

impl ChainOfThoughtEngine {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }

    pub fn build_prompt(input: &EngineInput<'_>) -> String {
        format!(
            "You are an analyst for a visual inspection line. Answer the question using only \
             the evidence below.\n\n\
             Question: {query}\n\n\
             Evidence (JSON):\n{evidence}\n\n\
             {extras}\
             Think step by step and respond with exactly these four sections, in order:\n\
             1. Data summary: the key numbers from the evidence.\n\
             2. Patterns: trends or repeated failures visible in the evidence.\n\
             3. Probable cause: the most likely explanation, citing the evidence.\n\
             4. Recommendations: concrete next steps.\n\
             If part of the evidence is missing, say it is unknown. Never treat missing data as zero.\n",
            query = input.query,
            evidence = input.evidence.render_for_prompt(PROMPT_EVIDENCE_CHARS),
            extras = input.prompt_extras(),
        )
    }
}

#[async_trait]
impl Reasoner for ChainOfThoughtEngine {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::ChainOfThought
    }

    async fn reason(&self, input: &EngineInput<'_>) -> Draft {
        let fallback = || {
            Draft::new(
                DirectEngine::render(input.intent, input.evidence),
                ReasoningMode::ChainOfThought,
            )
            .degraded()
        };

        if input.evidence.is_empty() {
            warn!("no evidence gathered, skipping chain-of-thought call");
            return fallback();
        }

        match self.model.complete(&Self::build_prompt(input)).await {
            Ok(answer) if !answer.trim().is_empty() => {
                debug!(chars = answer.len(), "chain-of-thought answer produced");
                Draft::new(answer.trim(), ReasoningMode::ChainOfThought).with_calls(1)
            }
            Ok(_) => {
                warn!("empty chain-of-thought output, using template answer");
                fallback().with_calls(1)
            }
            Err(e) => {
                warn!(error = %e, "chain-of-thought model call failed, using template answer");
                fallback().with_calls(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EvidenceBundle, PeriodStatistics, Section};
    use kestrel_core::{Entities, Intent, IntentResult, Period, Statistics};
    use kestrel_test_utils::MockCompletion;
    use std::sync::Arc;
    use std::time::Duration;

    fn bundle() -> EvidenceBundle {
        let mut bundle = EvidenceBundle::new();
        bundle.insert(
            Section::Statistics,
            serde_json::to_value(PeriodStatistics {
                period: Period::Today,
                stats: Statistics::from_counts(7, 5, 2),
            })
            .unwrap(),
        );
        bundle
    }

    fn engine(mock: Arc<MockCompletion>) -> ChainOfThoughtEngine {
        ChainOfThoughtEngine::new(ModelHandle::new(mock, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn one_call_with_four_sections_requested() {
        let mock = Arc::new(MockCompletion::new().with_default(
            "1. Data summary: 7 inspections.\n2. Patterns: none.\n3. Probable cause: n/a.\n4. Recommendations: none.",
        ));
        let intent = IntentResult::new(Intent::Summary, Entities::new(), false);
        let evidence = bundle();
        let draft = engine(mock.clone())
            .reason(&EngineInput::new("summary", &intent, &evidence))
            .await;

        assert_eq!(mock.call_count(), 1);
        assert!(draft.answer.starts_with("1. Data summary"));
        assert!(!draft.degraded);
        let prompt = &mock.prompts().await[0];
        for label in ["Data summary", "Patterns", "Probable cause", "Recommendations"] {
            assert!(prompt.contains(label), "missing {label}");
        }
        assert!(prompt.contains("\"total\": 7"));
    }

    #[tokio::test]
    async fn unavailable_model_falls_back_to_template() {
        let mock = Arc::new(MockCompletion::unavailable());
        let intent = IntentResult::new(Intent::Summary, Entities::new(), false);
        let evidence = bundle();
        let draft = engine(mock)
            .reason(&EngineInput::new("summary", &intent, &evidence))
            .await;
        assert!(draft.degraded);
        assert!(draft.answer.contains("Pass rate: 71.4%"));
        assert_eq!(draft.mode, ReasoningMode::ChainOfThought);
    }

    #[tokio::test]
    async fn slow_model_times_out_into_template() {
        let mock = Arc::new(MockCompletion::new().with_delay(Duration::from_millis(200)));
        let engine = ChainOfThoughtEngine::new(ModelHandle::new(mock, Duration::from_millis(20)));
        let intent = IntentResult::new(Intent::Summary, Entities::new(), false);
        let evidence = bundle();
        let draft = engine
            .reason(&EngineInput::new("summary", &intent, &evidence))
            .await;
        assert!(draft.degraded);
        assert!(draft.answer.contains("Total: 7"));
    }

    #[tokio::test]
    async fn empty_evidence_skips_the_model() {
        let mock = Arc::new(MockCompletion::new());
        let intent = IntentResult::new(Intent::Summary, Entities::new(), false);
        let evidence = EvidenceBundle::new();
        let draft = engine(mock.clone())
            .reason(&EngineInput::new("summary", &intent, &evidence))
            .await;
        assert_eq!(mock.call_count(), 0);
        assert_eq!(draft.answer, crate::engines::INSUFFICIENT_DATA);
    }
}
