// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The four reasoning engines.
//!
//! Every engine turns an [`EngineInput`] into a [`Draft`] and never fails:
//! model and tool errors degrade into template answers built from the
//! evidence that was gathered.

pub mod chain;
pub mod direct;
pub mod pipeline;
pub mod react;

pub use chain::ChainOfThoughtEngine;
pub use direct::DirectEngine;
pub use pipeline::{Analysis, PipelineEngine, PlanSource, PlanStep, StepResult};
pub use react::{ParsedAction, ReactStep, ReactTrace, Termination, ToolLoopEngine, parse_action};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kestrel_core::{CompletionAdapter, IntentResult, KestrelError, complete_within};
use kestrel_router::ReasoningMode;

use crate::evidence::EvidenceBundle;

/// Answer given when no collaborator could supply any evidence.
pub const INSUFFICIENT_DATA: &str = "Insufficient data: the inspection records could not be \
retrieved right now, so this question cannot be answered. Please try again later.";

/// Evidence characters inlined into model prompts.
pub(crate) const PROMPT_EVIDENCE_CHARS: usize = 6000;

/// A completion backend with the per-call timeout applied.
#[derive(Clone)]
pub struct ModelHandle {
    completion: Arc<dyn CompletionAdapter>,
    timeout: Duration,
}

impl ModelHandle {
    pub fn new(completion: Arc<dyn CompletionAdapter>, timeout: Duration) -> Self {
        Self {
            completion,
            timeout,
        }
    }

    /// Completes `prompt`, failing with [`KestrelError::Timeout`] when the
    /// backend does not answer in time.
    pub async fn complete(&self, prompt: &str) -> Result<String, KestrelError> {
        complete_within(self.completion.as_ref(), prompt, self.timeout).await
    }

    pub fn completion(&self) -> Arc<dyn CompletionAdapter> {
        self.completion.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Everything an engine reasons over for one query.
#[derive(Debug, Clone, Copy)]
pub struct EngineInput<'a> {
    /// Effective query text, after follow-up enrichment.
    pub query: &'a str,
    pub intent: &'a IntentResult,
    pub evidence: &'a EvidenceBundle,
    /// Rendered conversation context, when context is enabled.
    pub context: Option<&'a str>,
    /// Improvement list from a failed reflection, for the corrective pass.
    pub feedback: &'a [String],
}

impl<'a> EngineInput<'a> {
    pub fn new(query: &'a str, intent: &'a IntentResult, evidence: &'a EvidenceBundle) -> Self {
        Self {
            query,
            intent,
            evidence,
            context: None,
            feedback: &[],
        }
    }

    pub fn with_context(mut self, context: Option<&'a str>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_feedback(mut self, feedback: &'a [String]) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn is_correction(&self) -> bool {
        !self.feedback.is_empty()
    }

    /// Conversation context and correction feedback blocks for prompts.
    pub(crate) fn prompt_extras(&self) -> String {
        let mut extras = String::new();
        if let Some(context) = self.context {
            extras.push_str("Conversation context:\n");
            extras.push_str(context);
            extras.push_str("\n\n");
        }
        if self.is_correction() {
            extras.push_str("A previous answer was rejected. Address these issues:\n");
            for item in self.feedback {
                extras.push_str("- ");
                extras.push_str(item);
                extras.push('\n');
            }
            extras.push('\n');
        }
        extras
    }
}

/// One engine's answer before reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub answer: String,
    pub mode: ReasoningMode,
    pub model_calls: usize,
    /// True when the engine fell back to a template.
    pub degraded: bool,
    /// `(tool, output)` pairs observed while reasoning.
    pub observations: Vec<(String, String)>,
}

impl Draft {
    pub fn new(answer: impl Into<String>, mode: ReasoningMode) -> Self {
        Self {
            answer: answer.into(),
            mode,
            model_calls: 0,
            degraded: false,
            observations: Vec::new(),
        }
    }

    pub(crate) fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    pub(crate) fn with_calls(mut self, model_calls: usize) -> Self {
        self.model_calls = model_calls;
        self
    }
}

/// A reasoning strategy.
#[async_trait]
pub trait Reasoner: Send + Sync {
    fn mode(&self) -> ReasoningMode;

    /// Produces a draft answer. Never fails; degraded paths set
    /// [`Draft::degraded`].
    async fn reason(&self, input: &EngineInput<'_>) -> Draft;
}
