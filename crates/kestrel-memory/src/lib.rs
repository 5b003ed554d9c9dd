// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory and semantic record search for Kestrel.
//!
//! ## Architecture
//!
//! - **LongTermMemory**: capped, oldest-first collections of insights,
//!   patterns, and period summaries, with relevance lookup and a
//!   topic-grouped knowledge view
//! - **Summarizer**: turns a window of conversation exchanges into a
//!   summary outcome, via the model or counting heuristics
//! - **MemoryPersistence**: save/load of full snapshots (JSON files)
//! - **SemanticIndex**: per-record embeddings with cosine search, hybrid
//!   keyword/vector retrieval, and find-similar
//! - **HashingEmbedder**: deterministic offline embedding adapter
//! - **weighted_rrf**: reciprocal rank fusion used by hybrid search

pub mod embedder;
pub mod fusion;
pub mod index;
pub mod longterm;
pub mod persistence;
pub mod summarizer;
pub mod types;

pub use embedder::HashingEmbedder;
pub use fusion::weighted_rrf;
pub use index::{IndexStats, SearchHit, SemanticIndex};
pub use longterm::LongTermMemory;
pub use persistence::{JsonFilePersistence, MemoryPersistence};
pub use summarizer::Summarizer;
pub use types::{
    Insight, KnowledgeView, LongTermStats, MemorySnapshot, MemorySource, Pattern, PeriodSummary,
    RelevantMemories, SummaryOutcome, SummaryTier, cosine_similarity,
};
