// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete reasoning session over mock
//! collaborators and a temp directory for memory snapshots. Provides
//! `ask()` to drive the full query pipeline in tests.

use std::path::PathBuf;
use std::sync::Arc;

use kestrel_agent::{Collaborators, ReasoningSession};
use kestrel_config::KestrelConfig;
use kestrel_core::{DocumentHit, InspectionRecord, KestrelError, Period, Statistics};
use kestrel_memory::HashingEmbedder;

use crate::mock_completion::MockCompletion;
use crate::mock_store::{MockDocuments, MockRecordStore};

/// Embedding width used by harness sessions.
const HARNESS_DIMENSIONS: usize = 64;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    completion: MockCompletion,
    records: MockRecordStore,
    documents: Vec<DocumentHit>,
    documents_unavailable: bool,
    config: KestrelConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            completion: MockCompletion::new(),
            records: MockRecordStore::new(),
            documents: Vec::new(),
            documents_unavailable: false,
            config: KestrelConfig::default(),
        }
    }

    /// Replace the mock completion backend.
    pub fn with_completion(mut self, completion: MockCompletion) -> Self {
        self.completion = completion;
        self
    }

    /// Replace the mock record store.
    pub fn with_records(mut self, records: MockRecordStore) -> Self {
        self.records = records;
        self
    }

    /// Shorthand for a record store that only knows one period's statistics.
    pub fn with_statistics(mut self, period: Period, stats: Statistics) -> Self {
        self.records = self.records.with_statistics(period, stats);
        self
    }

    pub fn with_documents(mut self, hits: Vec<DocumentHit>) -> Self {
        self.documents = hits;
        self
    }

    /// Make the document search fail on every call.
    pub fn with_documents_unavailable(mut self) -> Self {
        self.documents_unavailable = true;
        self
    }

    /// Adjust the configuration before the session is built.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut KestrelConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Build the test harness, creating the session and a temp directory.
    pub fn build(self) -> Result<TestHarness, KestrelError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| KestrelError::Persistence {
            message: "failed to create temp dir".into(),
            source: Some(Box::new(e)),
        })?;

        let completion = Arc::new(self.completion);
        let records = Arc::new(self.records);
        let documents = Arc::new(if self.documents_unavailable {
            MockDocuments::unavailable()
        } else {
            MockDocuments::new(self.documents)
        });

        let session = ReasoningSession::new(
            &self.config,
            Collaborators {
                completion: completion.clone(),
                embedder: Arc::new(HashingEmbedder::new(HARNESS_DIMENSIONS)),
                records: records.clone(),
                documents: documents.clone(),
            },
        );

        Ok(TestHarness {
            completion,
            records,
            documents,
            session,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A reasoning session over mock collaborators.
pub struct TestHarness {
    /// The mock completion backend shared with the session.
    pub completion: Arc<MockCompletion>,
    /// The mock record store shared with the session.
    pub records: Arc<MockRecordStore>,
    pub documents: Arc<MockDocuments>,
    pub session: ReasoningSession,
    pub config: KestrelConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Ask with context and reflection on, vector search off.
    pub async fn ask(&mut self, text: &str) -> String {
        self.session.process_query(text, true, true, false).await
    }

    /// Ask with explicit switches.
    pub async fn ask_with(
        &mut self,
        text: &str,
        use_context: bool,
        use_reflection: bool,
        use_vector_search: bool,
    ) -> String {
        self.session
            .process_query(text, use_context, use_reflection, use_vector_search)
            .await
    }

    pub async fn index(&self, records: &[InspectionRecord]) -> Result<usize, KestrelError> {
        self.session.index_records(records).await
    }

    /// A path inside the harness temp directory.
    pub fn temp_path(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }
}
