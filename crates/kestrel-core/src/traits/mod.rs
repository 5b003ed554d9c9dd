// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators the engine consumes.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod completion;
pub mod documents;
pub mod embedding;
pub mod records;

pub use adapter::PluginAdapter;
pub use completion::CompletionAdapter;
pub use documents::DocumentSearch;
pub use embedding::EmbeddingAdapter;
pub use records::RecordStore;
