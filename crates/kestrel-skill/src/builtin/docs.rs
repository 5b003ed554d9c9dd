// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in document corpus search tool.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{DocumentSearch, KestrelError};

use super::clip;
use crate::tool::{Tool, ToolName, ToolOutput};

/// Hits returned per search.
const MAX_HITS: usize = 3;

pub struct SearchDocsTool {
    documents: Arc<dyn DocumentSearch>,
    max_chars: usize,
}

impl SearchDocsTool {
    pub fn new(documents: Arc<dyn DocumentSearch>, max_chars: usize) -> Self {
        Self {
            documents,
            max_chars,
        }
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> ToolName {
        ToolName::SearchDocs
    }

    fn description(&self) -> &str {
        "Search manuals and troubleshooting documents. Input: search words"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "description": "words to look for in the documents"
        })
    }

    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
        if self.documents.document_count() == 0 {
            return Ok(ToolOutput::error("Error: no documents are loaded"));
        }

        let hits: Vec<_> = self
            .documents
            .search(input)
            .await?
            .into_iter()
            .take(MAX_HITS)
            .collect();
        if hits.is_empty() {
            return Ok(ToolOutput::ok("No matching documents found"));
        }

        let json = serde_json::to_string_pretty(&hits).map_err(|e| KestrelError::Tool {
            message: format!("failed to encode document hits: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(ToolOutput::ok(clip(&json, self.max_chars)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::DocumentHit;
    use kestrel_test_utils::MockDocuments;

    fn hit(source: &str) -> DocumentHit {
        DocumentHit {
            source: source.into(),
            excerpt: "Check the lens cable before restarting.".into(),
            score: 2,
        }
    }

    #[tokio::test]
    async fn returns_hits_as_json() {
        let tool = SearchDocsTool::new(Arc::new(MockDocuments::new(vec![hit("camera.md")])), 500);
        let output = tool.invoke("lens cable").await.unwrap();
        assert!(!output.is_error);
        assert!(output.content.contains("camera.md"));
    }

    #[tokio::test]
    async fn no_documents_is_error_output() {
        let tool = SearchDocsTool::new(Arc::new(MockDocuments::default()), 500);
        let output = tool.invoke("anything").await.unwrap();
        assert!(output.is_error);
    }

    #[tokio::test]
    async fn unavailable_corpus_is_error_output() {
        let tool = SearchDocsTool::new(Arc::new(MockDocuments::unavailable()), 500);
        let output = tool.invoke("anything").await.unwrap();
        assert!(output.is_error);
    }
}
