// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query intent, complexity, and extracted entity slots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The classified purpose of a query.
///
/// Variants are declared in classification priority order, highest first.
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
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Troubleshoot,
    Analyze,
    Summary,
    Latest,
    Detail,
    Count,
}

impl Intent {
    /// Complexity is a pure function of intent.
    pub fn complexity(&self) -> Complexity {
        match self {
            Intent::Count | Intent::Detail | Intent::Latest => Complexity::Simple,
            Intent::Summary => Complexity::Medium,
            Intent::Analyze | Intent::Troubleshoot => Complexity::Complex,
        }
    }
}

/// Complexity tier derived from an [`Intent`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// A named entity slot carried between turns by working memory.
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
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Device,
    Station,
    TimePeriod,
    Result,
}

impl Slot {
    /// Human-readable label used when rendering slots into text.
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Device => "device",
            Slot::Station => "station",
            Slot::TimePeriod => "time period",
            Slot::Result => "result",
        }
    }
}

/// Extracted entities. Unmatched slots are absent, never defaulted.
pub type Entities = BTreeMap<Slot, String>;

/// Output of the intent classifier for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub complexity: Complexity,
    pub requires_reasoning: bool,
    pub entities: Entities,
    /// The query names two periods or two devices, or uses a comparison word.
    #[serde(default)]
    pub comparison: bool,
}

impl IntentResult {
    /// Builds a result whose complexity and reasoning flag follow from `intent`.
    pub fn new(intent: Intent, entities: Entities, comparison: bool) -> Self {
        let complexity = intent.complexity();
        Self {
            intent,
            complexity,
            requires_reasoning: complexity != Complexity::Simple,
            entities,
            comparison,
        }
    }

    pub fn entity(&self, slot: Slot) -> Option<&str> {
        self.entities.get(&slot).map(String::as_str)
    }
}
