// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry for the reasoning engines.
//!
//! Tools are addressed by the closed [`ToolName`] enum. Model output naming
//! a tool is parsed into a `ToolName` and resolved by exact lookup in the
//! [`ToolRegistry`]; unknown names never reach a handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::KestrelError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Every tool a reasoning engine may name.
///
/// `Answer` is the terminal action of the tool-use loop. It has no handler
/// and is never registered.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Filtered inspection records from the record store.
    QueryDatabase,
    /// Matching passages from manuals and troubleshooting documents.
    SearchDocs,
    /// Pass and fail counts for one period.
    GetStatistics,
    /// Arithmetic expressions, or the current pass rate.
    Calculate,
    /// Statistics of two periods side by side.
    Compare,
    /// Daily pass rates over a period.
    AnalyzeTrend,
    /// Ends the loop with the model's final answer.
    Answer,
}

impl ToolName {
    /// Parses a tool name as written by a model.
    ///
    /// Surrounding whitespace, quotes, backticks, and trailing punctuation
    /// are ignored; hyphens and spaces are read as underscores.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '.' || c == ':')
            .trim()
            .replace(['-', ' '], "_");
        cleaned.parse().ok()
    }

    /// True for the action that ends the tool-use loop.
    pub fn is_terminal(&self) -> bool {
        *self == ToolName::Answer
    }
}

/// Output from a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The content returned by the tool (text output, JSON, etc.).
    pub content: String,
    /// Whether the tool invocation resulted in an error.
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful result.
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed invocation. The model still sees `content` as its observation.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Unified trait for the engine's tools.
///
/// Tools receive the free-text `action_input` the model produced and
/// return text suitable for feeding back to the model as an observation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the registry files this tool under.
    fn name(&self) -> ToolName;

    /// Returns a human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema describing the tool's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Invokes the tool with the model-supplied input text.
    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError>;
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registers a tool under its `name()`, replacing any previous one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name).cloned()
    }

    /// Invokes `name`, converting every failure into an error output.
    ///
    /// Missing tools and tool errors both come back as `is_error` outputs
    /// so the caller can feed them to the model as observations.
    pub async fn invoke(&self, name: ToolName, input: &str) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            return ToolOutput::error(format!("Error: tool '{name}' is not available"));
        };
        match tool.invoke(input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool invocation failed");
                ToolOutput::error(format!("Error running {name}: {e}"))
            }
        }
    }

    /// Returns (name, description) pairs for all registered tools.
    pub fn list(&self) -> Vec<(ToolName, &str)> {
        self.tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect()
    }

    /// One `"- name: description"` line per registered tool plus the
    /// terminal `answer` action, for prompts.
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = self
            .list()
            .into_iter()
            .map(|(name, description)| format!("- {name}: {description}"))
            .collect();
        lines.push(format!(
            "- {}: give the final answer to the user",
            ToolName::Answer
        ));
        lines.join("\n")
    }

    /// JSON definitions (`name`, `description`, `input_schema`) for all tools.
    pub fn tool_definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name().to_string(),
                    "description": t.description(),
                    "input_schema": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Names of every non-terminal tool that is not registered.
    pub fn missing(&self) -> Vec<ToolName> {
        ToolName::iter()
            .filter(|n| !n.is_terminal() && !self.tools.contains_key(n))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for registry tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> ToolName {
            ToolName::Calculate
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "string" })
        }

        async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
            if input == "boom" {
                return Err(KestrelError::Tool {
                    message: "exploded".into(),
                    source: None,
                });
            }
            Ok(ToolOutput::ok(input))
        }
    }

    #[test]
    fn loose_parsing_of_model_names() {
        assert_eq!(ToolName::parse_loose("query_database"), Some(ToolName::QueryDatabase));
        assert_eq!(ToolName::parse_loose(" `Get_Statistics` "), Some(ToolName::GetStatistics));
        assert_eq!(ToolName::parse_loose("analyze-trend"), Some(ToolName::AnalyzeTrend));
        assert_eq!(ToolName::parse_loose("search docs."), Some(ToolName::SearchDocs));
        assert_eq!(ToolName::parse_loose("answer"), Some(ToolName::Answer));
        assert_eq!(ToolName::parse_loose("rm -rf"), None);
        assert_eq!(ToolName::parse_loose(""), None);
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ToolName::AnalyzeTrend.to_string(), "analyze_trend");
        assert!(ToolName::Answer.is_terminal());
        assert!(!ToolName::Compare.is_terminal());
    }

    #[tokio::test]
    async fn registry_invoke_converts_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ok = registry.invoke(ToolName::Calculate, "hi").await;
        assert_eq!(ok, ToolOutput::ok("hi"));

        let failed = registry.invoke(ToolName::Calculate, "boom").await;
        assert!(failed.is_error);
        assert!(failed.content.contains("exploded"));

        let missing = registry.invoke(ToolName::Compare, "x").await;
        assert!(missing.is_error);
        assert!(missing.content.contains("compare"));
    }

    #[test]
    fn describe_lists_tools_and_answer() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let described = registry.describe();
        assert_eq!(
            described,
            "- calculate: Echoes the input back\n- answer: give the final answer to the user"
        );
        assert_eq!(registry.tool_definitions()[0]["name"], "calculate");
        assert_eq!(registry.missing().len(), 5);
    }
}
