// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reasoning-mode selection.
//!
//! Priority: configured override > complexity policy. The policy is a pure
//! function of the classified intent, so it can be tested without any engine.

use kestrel_config::model::ModeSetting;
use kestrel_core::{Complexity, IntentResult};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::debug;

/// The reasoning strategy used to answer a query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    Direct,
    ChainOfThought,
    ToolLoop,
    MultiAgent,
}

/// Mode decision with a human-readable reason for logs and stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub mode: ReasoningMode,
    pub reason: &'static str,
}

/// Chooses the reasoning engine for each classified query.
pub struct ModeSelector {
    setting: ModeSetting,
}

impl ModeSelector {
    pub fn new(setting: ModeSetting) -> Self {
        Self { setting }
    }

    /// Select the engine for `intent`.
    ///
    /// simple ⇒ Direct, medium ⇒ Chain-of-Thought, complex ⇒ Tool-Use Loop
    /// when the query carries comparison cues, else the Multi-Agent pipeline.
    pub fn select(&self, intent: &IntentResult) -> RoutingDecision {
        let decision = match self.setting {
            ModeSetting::Direct => forced(ReasoningMode::Direct),
            ModeSetting::Chain => forced(ReasoningMode::ChainOfThought),
            ModeSetting::ToolLoop => forced(ReasoningMode::ToolLoop),
            ModeSetting::MultiAgent => forced(ReasoningMode::MultiAgent),
            ModeSetting::Auto => Self::policy(intent),
        };
        debug!(
            intent = %intent.intent,
            mode = %decision.mode,
            reason = decision.reason,
            "reasoning mode selected"
        );
        decision
    }

    fn policy(intent: &IntentResult) -> RoutingDecision {
        match intent.complexity {
            Complexity::Simple => RoutingDecision {
                mode: ReasoningMode::Direct,
                reason: "simple intent",
            },
            Complexity::Medium => RoutingDecision {
                mode: ReasoningMode::ChainOfThought,
                reason: "medium intent",
            },
            Complexity::Complex if intent.comparison => RoutingDecision {
                mode: ReasoningMode::ToolLoop,
                reason: "complex intent with comparison cues",
            },
            Complexity::Complex => RoutingDecision {
                mode: ReasoningMode::MultiAgent,
                reason: "complex intent",
            },
        }
    }
}

impl Default for ModeSelector {
    fn default() -> Self {
        Self::new(ModeSetting::Auto)
    }
}

fn forced(mode: ReasoningMode) -> RoutingDecision {
    RoutingDecision {
        mode,
        reason: "configured override",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{Entities, Intent};

    fn select(intent: Intent, comparison: bool) -> ReasoningMode {
        ModeSelector::default()
            .select(&IntentResult::new(intent, Entities::new(), comparison))
            .mode
    }

    #[test]
    fn simple_intents_go_direct() {
        for intent in [Intent::Count, Intent::Detail, Intent::Latest] {
            assert_eq!(select(intent, false), ReasoningMode::Direct);
            assert_eq!(select(intent, true), ReasoningMode::Direct);
        }
    }

    #[test]
    fn summary_goes_to_chain_of_thought() {
        assert_eq!(select(Intent::Summary, false), ReasoningMode::ChainOfThought);
    }

    #[test]
    fn complex_with_comparison_goes_to_tool_loop() {
        assert_eq!(select(Intent::Analyze, true), ReasoningMode::ToolLoop);
        assert_eq!(select(Intent::Troubleshoot, true), ReasoningMode::ToolLoop);
    }

    #[test]
    fn complex_without_comparison_goes_to_multi_agent() {
        assert_eq!(select(Intent::Analyze, false), ReasoningMode::MultiAgent);
        assert_eq!(select(Intent::Troubleshoot, false), ReasoningMode::MultiAgent);
    }

    #[test]
    fn override_wins() {
        let selector = ModeSelector::new(ModeSetting::ToolLoop);
        let decision = selector.select(&IntentResult::new(Intent::Count, Entities::new(), false));
        assert_eq!(decision.mode, ReasoningMode::ToolLoop);
        assert_eq!(decision.reason, "configured override");
    }

    #[test]
    fn mode_display_names() {
        assert_eq!(ReasoningMode::ChainOfThought.to_string(), "chain_of_thought");
        assert_eq!(ReasoningMode::MultiAgent.to_string(), "multi_agent");
    }
}
