// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Kestrel reasoning engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Kestrel workspace. Every collaborator the
//! engine talks to (text completion, embeddings, record store, document
//! search) is reached through a trait defined here.

pub mod domain;
pub mod error;
pub mod intent;
pub mod json;
pub mod text;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use domain::{
    DocumentHit, FailAnalysis, FailGroup, InspectionRecord, Period, RecordFilter, Statistics,
    TrendPoint, Verdict,
};
pub use error::KestrelError;
pub use intent::{Complexity, Entities, Intent, IntentResult, Slot};
pub use types::{AdapterType, HealthStatus, SessionId};

pub use traits::completion::complete_within;
pub use traits::{
    CompletionAdapter, DocumentSearch, EmbeddingAdapter, PluginAdapter, RecordStore,
};
