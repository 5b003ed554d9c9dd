// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document corpus search trait.

use async_trait::async_trait;

use crate::domain::DocumentHit;
use crate::error::KestrelError;
use crate::traits::adapter::PluginAdapter;

/// Keyword search over manuals and other reference documents.
#[async_trait]
pub trait DocumentSearch: PluginAdapter {
    /// Returns the best-matching documents for `query`, best first.
    async fn search(&self, query: &str) -> Result<Vec<DocumentHit>, KestrelError>;

    /// Number of loaded documents.
    fn document_count(&self) -> usize;
}
