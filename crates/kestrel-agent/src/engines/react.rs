// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ReAct-style tool-use loop.
//!
//! Each cycle asks the model for a `Thought / Action / Action Input`
//! triple, runs the named tool and feeds the result back as an
//! observation. The loop is bounded by an explicit step counter: it stops
//! when the model selects `answer` or after `max_steps` cycles, in which
//! case a best-effort answer is assembled from the observations.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::text::truncate_chars;
use kestrel_router::ReasoningMode;
use kestrel_skill::{ToolName, ToolRegistry};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Draft, EngineInput, ModelHandle, Reasoner};
use crate::engines::direct::DirectEngine;

/// Evidence characters inlined into each step prompt.
const STEP_EVIDENCE_CHARS: usize = 2000;

/// Prior thoughts and observations carried into each step prompt.
const HISTORY_WINDOW: usize = 3;

/// Characters kept per observation in step prompts.
const HISTORY_OBSERVATION_CHARS: usize = 200;

/// Characters kept per observation in the fallback answer.
const FALLBACK_OBSERVATION_CHARS: usize = 300;

const UNPARSABLE_OBSERVATION: &str = "Could not parse an action. Reply with `Thought:`, \
`Action:` and `Action Input:` lines.";

/// The model's proposal for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub thought: String,
    pub action: String,
    pub action_input: String,
}

/// One THINK → ACT → OBSERVE cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactStep {
    /// 1-based cycle number.
    pub index: usize,
    pub thought: String,
    /// `None` when the output named no valid tool.
    pub action: Option<ToolName>,
    pub action_input: String,
    pub observation: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model selected the terminal `answer` action.
    Answered,
    /// `max_steps` cycles ran without an answer.
    StepLimit,
    /// The model backend failed mid-loop.
    ModelUnavailable,
}

/// Full record of one loop run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactTrace {
    pub steps: Vec<ReactStep>,
    pub answer: String,
    pub termination: Termination,
    pub model_calls: usize,
}

/// Parses `Thought:`, `Action:` and `Action Input:` fields.
///
/// Labels are case-insensitive and a field runs until the next label, so
/// multi-line answers survive. Returns `None` without an `Action:` line.
pub fn parse_action(response: &str) -> Option<ParsedAction> {
    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        None,
        Thought,
        Action,
        Input,
    }

    const LABELS: [(&str, Field); 3] = [
        ("action input:", Field::Input),
        ("action:", Field::Action),
        ("thought:", Field::Thought),
    ];

    let mut thought = Vec::new();
    let mut action = None;
    let mut input = Vec::new();
    let mut current = Field::None;

    for line in response.lines() {
        let trimmed = line.trim().trim_start_matches(['*', '#', ' ']);
        let labelled = LABELS.iter().find_map(|(label, field)| {
            trimmed
                .get(..label.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(label))
                .map(|_| (*field, trimmed[label.len()..].trim_start_matches('*').trim()))
        });

        let (field, rest) = match labelled {
            Some((field, rest)) => {
                current = field;
                (field, rest)
            }
            None => (current, line.trim_end()),
        };

        match field {
            Field::Thought => thought.push(rest.to_string()),
            Field::Action if labelled.is_some() => {
                if action.is_none() {
                    action = Some(rest.to_string());
                }
            }
            Field::Input => input.push(rest.to_string()),
            Field::Action | Field::None => {}
        }
    }

    let action = action.filter(|a| !a.is_empty())?;
    Some(ParsedAction {
        thought: thought.join("\n").trim().to_string(),
        action,
        action_input: input
            .join("\n")
            .trim()
            .trim_matches('"')
            .trim()
            .to_string(),
    })
}

/// Bounded THINK → ACT → OBSERVE loop over the tool registry.
pub struct ToolLoopEngine {
    model: ModelHandle,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
}

impl ToolLoopEngine {
    pub fn new(model: ModelHandle, tools: Arc<ToolRegistry>, max_steps: usize) -> Self {
        Self {
            model,
            tools,
            max_steps,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Runs the loop to completion.
    ///
    /// At most `max_steps` step calls are made, plus one final-answer call
    /// when the step limit is reached.
    pub async fn run(&self, input: &EngineInput<'_>) -> ReactTrace {
        let mut steps: Vec<ReactStep> = Vec::new();
        let mut model_calls = 0;
        let mut termination = Termination::StepLimit;

        for index in 1..=self.max_steps {
            let prompt = self.step_prompt(input, &steps, index);
            model_calls += 1;
            let response = match self.model.complete(&prompt).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(step = index, error = %e, "tool loop model call failed, forcing answer");
                    termination = Termination::ModelUnavailable;
                    break;
                }
            };

            let Some(parsed) = parse_action(&response) else {
                warn!(step = index, "unparsable tool loop output, treating as no-op step");
                debug!(raw = %response, "raw tool loop output");
                steps.push(no_op_step(index, UNPARSABLE_OBSERVATION.to_string()));
                continue;
            };

            let Some(tool) = ToolName::parse_loose(&parsed.action) else {
                warn!(step = index, action = %parsed.action, "model named an unknown tool");
                let observation = format!(
                    "Unknown tool '{}'. Choose one of the listed tools.",
                    parsed.action
                );
                steps.push(ReactStep {
                    thought: parsed.thought,
                    action_input: parsed.action_input,
                    ..no_op_step(index, observation)
                });
                continue;
            };

            if tool.is_terminal() {
                let answer = if parsed.action_input.is_empty() {
                    parsed.thought.clone()
                } else {
                    parsed.action_input.clone()
                };
                if !answer.is_empty() {
                    info!(steps = index, "tool loop answered");
                    return ReactTrace {
                        steps,
                        answer,
                        termination: Termination::Answered,
                        model_calls,
                    };
                }
                steps.push(no_op_step(
                    index,
                    "The answer was empty. Put the final answer in `Action Input:`.".to_string(),
                ));
                continue;
            }

            let output = self.tools.invoke(tool, &parsed.action_input).await;
            debug!(
                step = index,
                tool = %tool,
                is_error = output.is_error,
                "tool observed"
            );
            steps.push(ReactStep {
                index,
                thought: parsed.thought,
                action: Some(tool),
                action_input: parsed.action_input,
                observation: output.content,
                is_error: output.is_error,
            });
        }

        let (answer, extra_calls) = self.forced_answer(input, &steps, termination).await;
        info!(
            steps = steps.len(),
            termination = ?termination,
            "tool loop stopped without an answer action"
        );
        ReactTrace {
            steps,
            answer,
            termination,
            model_calls: model_calls + extra_calls,
        }
    }

    fn step_prompt(&self, input: &EngineInput<'_>, steps: &[ReactStep], index: usize) -> String {
        let mut prompt = format!(
            "You are an inspection-data assistant answering a question step by step with tools.\n\n\
             Available tools:\n{tools}\n\n\
             Question: {query}\n\n\
             Evidence already gathered (JSON):\n{evidence}\n\n\
             {extras}",
            tools = self.tools.describe(),
            query = input.query,
            evidence = input.evidence.render_for_prompt(STEP_EVIDENCE_CHARS),
            extras = input.prompt_extras(),
        );

        let thoughts: Vec<&ReactStep> = steps.iter().filter(|s| !s.thought.is_empty()).collect();
        if !thoughts.is_empty() {
            prompt.push_str("Previous thoughts:\n");
            for step in &thoughts[thoughts.len().saturating_sub(HISTORY_WINDOW)..] {
                prompt.push_str(&format!("- {}\n", step.thought));
            }
            prompt.push('\n');
        }
        if !steps.is_empty() {
            prompt.push_str("Recent observations:\n");
            for step in &steps[steps.len().saturating_sub(HISTORY_WINDOW)..] {
                let action = step
                    .action
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "none".to_string());
                prompt.push_str(&format!(
                    "- [{action}] {}\n",
                    truncate_chars(&step.observation, HISTORY_OBSERVATION_CHARS)
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "Step {index} of {max}. Respond in exactly this format:\n\
             Thought: <your reasoning>\n\
             Action: <tool name>\n\
             Action Input: <input for the tool, or the final answer when Action is answer>\n",
            max = self.max_steps
        ));
        prompt
    }

    async fn forced_answer(
        &self,
        input: &EngineInput<'_>,
        steps: &[ReactStep],
        termination: Termination,
    ) -> (String, usize) {
        let observed: Vec<&ReactStep> = steps
            .iter()
            .filter(|s| s.action.is_some() && !s.is_error)
            .collect();

        if termination != Termination::ModelUnavailable {
            let mut prompt = format!(
                "Final answer from observations. The step limit was reached. Answer the question \
                 as well as possible using only these observations and the evidence.\n\n\
                 Question: {}\n\nObservations:\n",
                input.query
            );
            for step in steps {
                let action = step.action.map(|a| a.to_string()).unwrap_or_default();
                prompt.push_str(&format!("- [{action}] {}\n", step.observation));
            }
            prompt.push_str(&format!(
                "\nEvidence (JSON):\n{}\n",
                input.evidence.render_for_prompt(STEP_EVIDENCE_CHARS)
            ));
            match self.model.complete(&prompt).await {
                Ok(answer) if !answer.trim().is_empty() => return (answer.trim().to_string(), 1),
                Ok(_) => warn!("empty forced answer, using observation template"),
                Err(e) => warn!(error = %e, "forced answer call failed, using observation template"),
            }
            return (fallback_answer(input, steps.len(), &observed), 1);
        }
        (fallback_answer(input, steps.len(), &observed), 0)
    }
}

fn no_op_step(index: usize, observation: String) -> ReactStep {
    ReactStep {
        index,
        thought: String::new(),
        action: None,
        action_input: String::new(),
        observation,
        is_error: true,
    }
}

/// Lists the observations, or renders the evidence when there are none.
fn fallback_answer(input: &EngineInput<'_>, cycles: usize, observed: &[&ReactStep]) -> String {
    if observed.is_empty() {
        return DirectEngine::render(input.intent, input.evidence);
    }
    let mut answer = format!(
        "I could not reach a final conclusion in {cycles} steps. Here is what I found:"
    );
    for step in observed {
        let action = step.action.map(|a| a.to_string()).unwrap_or_default();
        answer.push_str(&format!(
            "\n- {action}({}): {}",
            step.action_input,
            truncate_chars(&step.observation, FALLBACK_OBSERVATION_CHARS)
        ));
    }
    answer
}

#[async_trait]
impl Reasoner for ToolLoopEngine {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::ToolLoop
    }

    async fn reason(&self, input: &EngineInput<'_>) -> Draft {
        let trace = self.run(input).await;
        let observations = trace
            .steps
            .iter()
            .filter(|s| !s.is_error)
            .filter_map(|s| s.action.map(|a| (a.to_string(), s.observation.clone())))
            .collect();
        Draft {
            answer: trace.answer,
            mode: ReasoningMode::ToolLoop,
            model_calls: trace.model_calls,
            degraded: trace.termination != Termination::Answered,
            observations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceBundle;
    use kestrel_core::{Entities, Intent, IntentResult, Period, Statistics};
    use kestrel_router::IntentClassifier;
    use kestrel_skill::register_builtins;
    use kestrel_test_utils::{MockCompletion, MockDocuments, MockRecordStore};
    use proptest::prelude::*;
    use std::time::Duration;

    fn registry() -> Arc<ToolRegistry> {
        let records = MockRecordStore::new()
            .with_statistics(Period::Today, Statistics::from_counts(7, 5, 2))
            .with_statistics(Period::Yesterday, Statistics::from_counts(10, 9, 1));
        let mut registry = ToolRegistry::new();
        register_builtins(
            &mut registry,
            Arc::new(records),
            Arc::new(MockDocuments::default()),
            Arc::new(IntentClassifier::default()),
            500,
        );
        Arc::new(registry)
    }

    fn engine(mock: Arc<MockCompletion>, max_steps: usize) -> ToolLoopEngine {
        ToolLoopEngine::new(
            ModelHandle::new(mock, Duration::from_secs(5)),
            registry(),
            max_steps,
        )
    }

    fn intent() -> IntentResult {
        IntentResult::new(Intent::Analyze, Entities::new(), true)
    }

    #[test]
    fn parses_standard_triple() {
        let parsed = parse_action(
            "Thought: I need today's numbers\nAction: get_statistics\nAction Input: today",
        )
        .unwrap();
        assert_eq!(parsed.thought, "I need today's numbers");
        assert_eq!(parsed.action, "get_statistics");
        assert_eq!(parsed.action_input, "today");
    }

    #[test]
    fn parses_multiline_answer_and_loose_labels() {
        let parsed = parse_action(
            "**Thought:** done\n**ACTION:** answer\naction input: Line one\nLine two",
        )
        .unwrap();
        assert_eq!(parsed.action, "answer");
        assert_eq!(parsed.action_input, "Line one\nLine two");
    }

    #[test]
    fn missing_action_is_unparsable() {
        assert!(parse_action("I think the answer is 7").is_none());
        assert!(parse_action("Thought: hmm\nAction:").is_none());
    }

    #[tokio::test]
    async fn answers_after_observing_a_tool() {
        let mock = Arc::new(MockCompletion::with_responses(vec![
            "Thought: get numbers\nAction: get_statistics\nAction Input: today".into(),
            "Thought: I know now\nAction: answer\nAction Input: 7 inspections, 71.4% pass".into(),
        ]));
        let intent = intent();
        let evidence = EvidenceBundle::new();
        let trace = engine(mock.clone(), 5)
            .run(&EngineInput::new("compare", &intent, &evidence))
            .await;

        assert_eq!(trace.termination, Termination::Answered);
        assert_eq!(trace.answer, "7 inspections, 71.4% pass");
        assert_eq!(trace.steps.len(), 1);
        let observation = trace.steps[0].observation.replace(' ', "");
        assert!(observation.contains("\"total\":7"), "{observation}");
        assert_eq!(trace.model_calls, 2);

        let second_prompt = &mock.prompts().await[1];
        assert!(second_prompt.contains("Recent observations"));
        assert!(second_prompt.contains("- get numbers"));
    }

    #[tokio::test]
    async fn step_limit_forces_answer() {
        let mock = Arc::new(
            MockCompletion::new()
                .with_rule("Final answer from observations", "Best effort: 7 today.")
                .with_default("Thought: more data\nAction: get_statistics\nAction Input: today"),
        );
        let intent = intent();
        let evidence = EvidenceBundle::new();
        let trace = engine(mock.clone(), 3)
            .run(&EngineInput::new("q", &intent, &evidence))
            .await;

        assert_eq!(trace.steps.len(), 3);
        assert_eq!(trace.termination, Termination::StepLimit);
        assert_eq!(trace.answer, "Best effort: 7 today.");
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn tool_errors_become_observations() {
        let mock = Arc::new(MockCompletion::with_responses(vec![
            "Thought: compute\nAction: calculate\nAction Input: 1 / 0".into(),
            "Thought: ok\nAction: answer\nAction Input: cannot divide".into(),
        ]));
        let intent = intent();
        let evidence = EvidenceBundle::new();
        let trace = engine(mock, 5)
            .run(&EngineInput::new("q", &intent, &evidence))
            .await;
        assert!(trace.steps[0].is_error);
        assert!(trace.steps[0].observation.contains("Error"));
        assert_eq!(trace.termination, Termination::Answered);
    }

    #[tokio::test]
    async fn garbage_output_is_a_no_op_step() {
        let mock = Arc::new(MockCompletion::with_responses(vec![
            "I refuse to follow the format".into(),
            "Thought: ok\nAction: frobnicate\nAction Input: x".into(),
            "Action: answer\nAction Input: done".into(),
        ]));
        let intent = intent();
        let evidence = EvidenceBundle::new();
        let trace = engine(mock, 5)
            .run(&EngineInput::new("q", &intent, &evidence))
            .await;
        assert_eq!(trace.steps.len(), 2);
        assert!(trace.steps.iter().all(|s| s.action.is_none()));
        assert!(trace.steps[1].observation.contains("Unknown tool 'frobnicate'"));
        assert_eq!(trace.answer, "done");
    }

    #[tokio::test]
    async fn unavailable_model_stops_immediately_with_template() {
        let mock = Arc::new(MockCompletion::unavailable());
        let intent = intent();
        let evidence = EvidenceBundle::new();
        let draft = engine(mock.clone(), 5)
            .reason(&EngineInput::new("q", &intent, &evidence))
            .await;
        assert_eq!(mock.call_count(), 1);
        assert!(draft.degraded);
        assert_eq!(draft.answer, crate::engines::INSUFFICIENT_DATA);
    }

    #[tokio::test]
    async fn forced_answer_failure_lists_observations() {
        let mock = Arc::new(
            MockCompletion::with_responses(vec![
                "Thought: a\nAction: get_statistics\nAction Input: yesterday".into(),
                "Thought: b\nAction: get_statistics\nAction Input: today".into(),
            ])
            .with_rule("Final answer from observations", ""),
        );
        let intent = intent();
        let evidence = EvidenceBundle::new();
        let draft = engine(mock, 2)
            .reason(&EngineInput::new("q", &intent, &evidence))
            .await;
        assert!(draft.answer.starts_with("I could not reach a final conclusion in 2 steps"));
        assert!(draft.answer.contains("get_statistics(yesterday)"));
        assert_eq!(draft.observations.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn loop_never_exceeds_max_steps(max_steps in 0usize..6, outputs in proptest::collection::vec(".{0,40}", 0..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let trace = runtime.block_on(async {
                let mock = Arc::new(
                    MockCompletion::with_responses(outputs)
                        .with_default("Thought: again\nAction: get_statistics\nAction Input: today"),
                );
                let intent = intent();
                let evidence = EvidenceBundle::new();
                engine(mock, max_steps)
                    .run(&EngineInput::new("q", &intent, &evidence))
                    .await
            });
            prop_assert!(trace.steps.len() <= max_steps);
            prop_assert!(!trace.answer.is_empty());
        }
    }
}
