// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Planner → Executor → Analyzer pipeline.
//!
//! The planner makes one model call producing an ordered list of tool
//! calls. The executor runs that list sequentially without re-planning.
//! The analyzer makes one model call over everything collected, skipped
//! when nothing was collected at all. Cost is at most two model calls plus
//! the planned tool calls.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::json::parse_array;
use kestrel_core::text::truncate_chars;
use kestrel_core::{Intent, KestrelError};
use kestrel_router::ReasoningMode;
use kestrel_skill::{ToolName, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Draft, EngineInput, INSUFFICIENT_DATA, ModelHandle, PROMPT_EVIDENCE_CHARS, Reasoner};
use crate::engines::direct::DirectEngine;

/// Characters of each step result shown to the analyzer.
const ANALYZER_RESULT_CHARS: usize = 1500;

/// Characters of each step result in the template answer.
const TEMPLATE_RESULT_CHARS: usize = 300;

/// One planned tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub tool: ToolName,
    pub input: String,
}

impl PlanStep {
    pub fn new(tool: ToolName, input: impl Into<String>) -> Self {
        Self {
            tool,
            input: input.into(),
        }
    }
}

/// Where the executed plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Model,
    /// The planner call failed; the intent's default plan was used.
    Default,
    /// The planner answered with output that could not be parsed.
    Empty,
}

/// Outcome of one executed step. Failed steps keep an empty output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub tool: ToolName,
    pub input: String,
    pub output: String,
    pub ok: bool,
}

/// What the analyzer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub answer: String,
    /// The answer came from the template, not the model.
    pub degraded: bool,
    pub model_calls: usize,
}

impl Analysis {
    fn template(input: &EngineInput<'_>, results: &[StepResult], model_calls: usize) -> Self {
        Self {
            answer: template_answer(input, results),
            degraded: true,
            model_calls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPlanStep {
    tool: String,
    #[serde(default)]
    input: Value,
}

/// The three-stage multi-agent pipeline.
pub struct PipelineEngine {
    model: ModelHandle,
    tools: Arc<ToolRegistry>,
    max_plan_steps: usize,
}

impl PipelineEngine {
    pub fn new(model: ModelHandle, tools: Arc<ToolRegistry>, max_plan_steps: usize) -> Self {
        Self {
            model,
            tools,
            max_plan_steps,
        }
    }

    /// The plan used when the planner cannot be reached.
    pub fn default_plan(intent: Intent, query: &str) -> Vec<PlanStep> {
        match intent {
            Intent::Analyze => vec![
                PlanStep::new(ToolName::GetStatistics, "today"),
                PlanStep::new(ToolName::QueryDatabase, "recent 10"),
                PlanStep::new(ToolName::AnalyzeTrend, "week"),
            ],
            Intent::Troubleshoot => vec![
                PlanStep::new(ToolName::QueryDatabase, "fail today"),
                PlanStep::new(ToolName::GetStatistics, "today"),
                PlanStep::new(ToolName::SearchDocs, query),
            ],
            _ => vec![PlanStep::new(ToolName::GetStatistics, "today")],
        }
    }

    /// Parses a planner response: a JSON array of `{"tool", "input"}`.
    ///
    /// Unknown tools and `answer` are dropped; the plan is capped at
    /// `max_steps`.
    pub fn parse_plan(response: &str, max_steps: usize) -> Result<Vec<PlanStep>, KestrelError> {
        let raw: Vec<RawPlanStep> = parse_array(response)?;
        Ok(raw
            .into_iter()
            .filter_map(|step| {
                let tool = ToolName::parse_loose(&step.tool).filter(|t| !t.is_terminal());
                if tool.is_none() {
                    warn!(tool = %step.tool, "dropping unknown tool from plan");
                }
                let input = match step.input {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                tool.map(|tool| PlanStep { tool, input })
            })
            .take(max_steps)
            .collect())
    }

    /// Planner stage: one model call.
    pub async fn plan(&self, input: &EngineInput<'_>) -> (Vec<PlanStep>, PlanSource) {
        let prompt = format!(
            "Plan the tool calls needed to answer the question. You are the planner of an \
             inspection-data team; an executor will run your plan in order and an analyst will \
             write the answer.\n\n\
             Available tools:\n{tools}\n\n\
             Question: {query}\n\n\
             {extras}\
             Respond with a JSON array of at most {max} steps, for example:\n\
             [{{\"tool\": \"get_statistics\", \"input\": \"today\"}}, \
             {{\"tool\": \"analyze_trend\", \"input\": \"week\"}}]\n",
            tools = self.tools.describe(),
            query = input.query,
            extras = input.prompt_extras(),
            max = self.max_plan_steps,
        );

        match self.model.complete(&prompt).await {
            Ok(response) => match Self::parse_plan(&response, self.max_plan_steps) {
                Ok(plan) => {
                    debug!(steps = plan.len(), "planner produced a plan");
                    (plan, PlanSource::Model)
                }
                Err(e) => {
                    warn!(error = %e, "malformed plan, executing an empty plan");
                    debug!(raw = %response, "raw planner output");
                    (Vec::new(), PlanSource::Empty)
                }
            },
            Err(e) => {
                warn!(error = %e, "planner unavailable, using default plan");
                let mut plan = Self::default_plan(input.intent.intent, input.query);
                plan.truncate(self.max_plan_steps);
                (plan, PlanSource::Default)
            }
        }
    }

    /// Executor stage: runs every step in order. Failures are recorded
    /// with an empty output and do not stop the run.
    pub async fn execute(&self, plan: &[PlanStep]) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(plan.len());
        for step in plan {
            let output = self.tools.invoke(step.tool, &step.input).await;
            if output.is_error {
                warn!(tool = %step.tool, error = %output.content, "plan step failed");
            }
            results.push(StepResult {
                tool: step.tool,
                input: step.input.clone(),
                output: if output.is_error {
                    String::new()
                } else {
                    output.content
                },
                ok: !output.is_error,
            });
        }
        results
    }

    /// Analyzer stage: one model call over the evidence and step results.
    ///
    /// With no evidence and no successful step there is nothing to
    /// synthesize, so the model is not called.
    pub async fn analyze(&self, input: &EngineInput<'_>, results: &[StepResult]) -> Analysis {
        if input.evidence.is_empty() && results.iter().all(|r| !r.ok) {
            debug!("nothing gathered, skipping the analyzer call");
            return Analysis::template(input, results, 0);
        }

        let mut gathered = String::new();
        for result in results {
            let output = if result.ok {
                truncate_chars(&result.output, ANALYZER_RESULT_CHARS)
            } else {
                "(no result)"
            };
            gathered.push_str(&format!("[{}({})]\n{}\n\n", result.tool, result.input, output));
        }
        if gathered.is_empty() {
            gathered.push_str("(no tool results)\n\n");
        }

        let prompt = format!(
            "Synthesize the findings of the inspection-data team into an answer.\n\n\
             Question: {query}\n\n\
             Evidence (JSON):\n{evidence}\n\n\
             Tool results:\n{gathered}\
             {extras}\
             Write the answer with four sections: Summary, Details, Analysis, Recommendations. \
             Use only facts from the evidence and tool results. Call missing data unknown.\n",
            query = input.query,
            evidence = input.evidence.render_for_prompt(PROMPT_EVIDENCE_CHARS),
            extras = input.prompt_extras(),
        );

        match self.model.complete(&prompt).await {
            Ok(answer) if !answer.trim().is_empty() => Analysis {
                answer: answer.trim().to_string(),
                degraded: false,
                model_calls: 1,
            },
            Ok(_) => {
                warn!("empty analyzer output, using template answer");
                Analysis::template(input, results, 1)
            }
            Err(e) => {
                warn!(error = %e, "analyzer unavailable, using template answer");
                Analysis::template(input, results, 1)
            }
        }
    }
}

fn template_answer(input: &EngineInput<'_>, results: &[StepResult]) -> String {
    let successful: Vec<&StepResult> = results.iter().filter(|r| r.ok).collect();
    if input.evidence.is_empty() && successful.is_empty() {
        return INSUFFICIENT_DATA.to_string();
    }

    let mut answer = String::new();
    if !input.evidence.is_empty() {
        answer.push_str(&DirectEngine::render(input.intent, input.evidence));
    }
    if !successful.is_empty() {
        if !answer.is_empty() {
            answer.push_str("\n\n");
        }
        answer.push_str("Details:");
        for result in successful {
            answer.push_str(&format!(
                "\n- {}({}): {}",
                result.tool,
                result.input,
                truncate_chars(&result.output, TEMPLATE_RESULT_CHARS)
            ));
        }
    }
    answer
}

#[async_trait]
impl Reasoner for PipelineEngine {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::MultiAgent
    }

    async fn reason(&self, input: &EngineInput<'_>) -> Draft {
        // The planner call is always attempted.
        let (plan, source) = self.plan(input).await;
        let results = self.execute(&plan).await;
        let analysis = self.analyze(input, &results).await;
        let model_calls = 1 + analysis.model_calls;
        info!(
            plan_steps = plan.len(),
            model_calls,
            source = ?source,
            failed = results.iter().filter(|r| !r.ok).count(),
            "pipeline finished"
        );

        Draft {
            answer: analysis.answer,
            mode: ReasoningMode::MultiAgent,
            model_calls,
            degraded: analysis.degraded || source != PlanSource::Model,
            observations: results
                .into_iter()
                .filter(|r| r.ok)
                .map(|r| (r.tool.to_string(), r.output))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceBundle;
    use kestrel_core::{Entities, IntentResult, Period, Statistics, TrendPoint};
    use kestrel_router::IntentClassifier;
    use kestrel_skill::register_builtins;
    use kestrel_test_utils::{MockCompletion, MockDocuments, MockRecordStore};
    use std::time::Duration;

    fn point(date: &str, pass_rate: f64) -> TrendPoint {
        TrendPoint {
            date: date.into(),
            total: 10,
            pass: (pass_rate / 10.0) as u64,
            fail: 10 - (pass_rate / 10.0) as u64,
            pass_rate,
        }
    }

    fn engine(mock: Arc<MockCompletion>, records: MockRecordStore) -> PipelineEngine {
        let mut registry = ToolRegistry::new();
        register_builtins(
            &mut registry,
            Arc::new(records),
            Arc::new(MockDocuments::default()),
            Arc::new(IntentClassifier::default()),
            500,
        );
        PipelineEngine::new(
            ModelHandle::new(mock, Duration::from_secs(5)),
            Arc::new(registry),
            5,
        )
    }

    fn records() -> MockRecordStore {
        MockRecordStore::new()
            .with_statistics(Period::Today, Statistics::from_counts(7, 5, 2))
            .with_trend(
                Period::Week,
                vec![point("2026-10-14", 60.0), point("2026-10-16", 90.0)],
            )
    }

    fn analyze_intent() -> IntentResult {
        IntentResult::new(Intent::Analyze, Entities::new(), false)
    }

    #[test]
    fn parse_plan_filters_and_caps() {
        let plan = PipelineEngine::parse_plan(
            r#"Here is the plan:
            [{"tool": "get_statistics", "input": "today"},
             {"tool": "teleport", "input": "x"},
             {"tool": "answer", "input": "x"},
             {"tool": "analyze_trend", "input": {"period": "week"}},
             {"tool": "calculate"}]"#,
            2,
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![
                PlanStep::new(ToolName::GetStatistics, "today"),
                PlanStep::new(ToolName::AnalyzeTrend, r#"{"period":"week"}"#),
            ]
        );
    }

    #[test]
    fn malformed_plan_is_an_error() {
        assert!(PipelineEngine::parse_plan("no plan today", 5).is_err());
    }

    #[test]
    fn default_plans_per_intent() {
        let analyze = PipelineEngine::default_plan(Intent::Analyze, "q");
        assert_eq!(analyze.len(), 3);
        assert_eq!(analyze[2], PlanStep::new(ToolName::AnalyzeTrend, "week"));

        let troubleshoot = PipelineEngine::default_plan(Intent::Troubleshoot, "why lens");
        assert_eq!(troubleshoot[2], PlanStep::new(ToolName::SearchDocs, "why lens"));

        assert_eq!(
            PipelineEngine::default_plan(Intent::Count, "q"),
            vec![PlanStep::new(ToolName::GetStatistics, "today")]
        );
    }

    #[tokio::test]
    async fn model_plan_is_executed_then_analyzed() {
        let mock = Arc::new(
            MockCompletion::new()
                .with_rule(
                    "Plan the tool calls",
                    r#"[{"tool": "get_statistics", "input": "today"}, {"tool": "analyze_trend", "input": "week"}]"#,
                )
                .with_rule("Synthesize", "Summary: improving week."),
        );
        let intent = analyze_intent();
        let evidence = EvidenceBundle::new();
        let draft = engine(mock.clone(), records())
            .reason(&EngineInput::new("analyze the week", &intent, &evidence))
            .await;

        assert_eq!(draft.answer, "Summary: improving week.");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(draft.model_calls, 2);
        assert!(!draft.degraded);
        assert_eq!(draft.observations.len(), 2);
        let analyzer_prompt = &mock.prompts().await[1];
        assert!(analyzer_prompt.contains("[analyze_trend(week)]"));
        assert!(analyzer_prompt.contains("improving"));
    }

    #[tokio::test]
    async fn unavailable_model_uses_default_plan_and_template() {
        let mock = Arc::new(MockCompletion::unavailable());
        let intent = analyze_intent();
        let evidence = EvidenceBundle::new();
        let engine = engine(mock, records());
        let (plan, source) = engine
            .plan(&EngineInput::new("analyze", &intent, &evidence))
            .await;
        assert_eq!(source, PlanSource::Default);
        assert_eq!(plan, PipelineEngine::default_plan(Intent::Analyze, "analyze"));

        let draft = engine
            .reason(&EngineInput::new("analyze", &intent, &evidence))
            .await;
        assert!(draft.degraded);
        assert!(draft.answer.starts_with("Details:"));
        assert!(draft.answer.contains("get_statistics(today)"));
    }

    #[tokio::test]
    async fn malformed_plan_runs_no_tools() {
        let records = records();
        let mock = Arc::new(
            MockCompletion::new()
                .with_rule("Plan the tool calls", "I would look at statistics first.")
                .with_rule("Synthesize", "Unknown."),
        );
        let intent = analyze_intent();
        let evidence = EvidenceBundle::new();
        let engine = engine(mock, records);
        let (plan, source) = engine
            .plan(&EngineInput::new("analyze", &intent, &evidence))
            .await;
        assert!(plan.is_empty());
        assert_eq!(source, PlanSource::Empty);
    }

    #[tokio::test]
    async fn failed_steps_record_empty_results() {
        let mock = Arc::new(MockCompletion::new());
        let engine = engine(mock, MockRecordStore::unavailable());
        let results = engine
            .execute(&[
                PlanStep::new(ToolName::GetStatistics, "today"),
                PlanStep::new(ToolName::Calculate, "2 * 3"),
            ])
            .await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert!(results[0].output.is_empty());
        assert!(results[1].ok);
        assert_eq!(results[1].output, "Result: 6");
    }

    #[tokio::test]
    async fn nothing_gathered_is_insufficient_data() {
        let mock = Arc::new(MockCompletion::unavailable());
        let engine = engine(mock, MockRecordStore::unavailable());
        let intent = analyze_intent();
        let evidence = EvidenceBundle::new();
        let draft = engine
            .reason(&EngineInput::new("analyze", &intent, &evidence))
            .await;
        assert_eq!(draft.answer, INSUFFICIENT_DATA);
        assert_eq!(draft.model_calls, 1);
        assert!(draft.degraded);
    }

    #[tokio::test]
    async fn empty_plan_without_evidence_skips_the_analyzer() {
        let mock = Arc::new(
            MockCompletion::new()
                .with_rule("Plan the tool calls", "I would look at statistics first.")
                .with_rule("Synthesize", "Everything is fine."),
        );
        let intent = analyze_intent();
        let evidence = EvidenceBundle::new();
        let draft = engine(mock.clone(), records())
            .reason(&EngineInput::new("analyze", &intent, &evidence))
            .await;

        assert_eq!(draft.answer, INSUFFICIENT_DATA);
        assert_eq!(draft.model_calls, 1);
        assert_eq!(mock.call_count(), draft.model_calls);
    }

    #[tokio::test]
    async fn call_count_matches_backend_when_analyzer_fails() {
        let mock = Arc::new(MockCompletion::new().with_rule(
            "Plan the tool calls",
            r#"[{"tool": "get_statistics", "input": "today"}]"#,
        ));
        let intent = analyze_intent();
        let evidence = EvidenceBundle::new();
        let engine = engine(mock.clone(), records());
        let (plan, _) = engine
            .plan(&EngineInput::new("analyze", &intent, &evidence))
            .await;
        let results = engine.execute(&plan).await;
        mock.set_failing(true);
        let analysis = engine
            .analyze(&EngineInput::new("analyze", &intent, &evidence), &results)
            .await;

        assert_eq!(analysis.model_calls, 1);
        assert!(analysis.degraded);
        assert!(analysis.answer.contains("get_statistics(today)"));
        assert_eq!(mock.call_count(), 2);
    }
}
