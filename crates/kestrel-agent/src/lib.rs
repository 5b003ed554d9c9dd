// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reasoning pipeline and session management for the Kestrel engine.
//!
//! The [`ReasoningSession`] is the central coordinator that:
//! - Enriches follow-up queries from conversation context
//! - Gathers evidence from the record store and document corpus
//! - Routes each query to one of four reasoning engines
//! - Grades drafts and attempts at most one correction
//! - Hands finished exchanges to background summarization

pub mod engines;
pub mod evidence;
pub mod reflection;
pub mod session;

pub use engines::{
    ChainOfThoughtEngine, DirectEngine, Draft, EngineInput, INSUFFICIENT_DATA, ModelHandle,
    PipelineEngine, Reasoner, ToolLoopEngine,
};
pub use evidence::{EvidenceBundle, EvidenceGatherer, Section};
pub use reflection::{ReflectionReport, ReflectionSummary, SelfReflection};
pub use session::{
    Collaborators, EngineStats, ReasoningSession, ReflectionOutcome, UNVERIFIED_NOTE,
};
