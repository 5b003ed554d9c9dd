// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the configured collaborators into a reasoning session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kestrel_agent::{Collaborators, ReasoningSession};
use kestrel_config::KestrelConfig;
use kestrel_config::model::EmbedderSetting;
use kestrel_core::{EmbeddingAdapter, KestrelError, RecordStore};
use kestrel_memory::HashingEmbedder;
use kestrel_ollama::OllamaClient;
use kestrel_storage::{KeywordDocumentIndex, SqliteRecordStore};
use tracing::{info, warn};

/// A session plus the handles the CLI needs around it.
pub struct Runtime {
    pub session: ReasoningSession,
    records: Arc<SqliteRecordStore>,
    snapshot_path: PathBuf,
}

impl Runtime {
    /// Opens the record store, loads the document corpus, builds the Ollama
    /// client and restores the memory snapshot when one exists.
    pub async fn start(config: &KestrelConfig) -> Result<Self, KestrelError> {
        let records = Arc::new(SqliteRecordStore::open(&config.storage).await?);
        let documents = Arc::new(KeywordDocumentIndex::load(&config.storage.documents_dir).await?);
        let ollama = Arc::new(OllamaClient::new(&config.ollama)?);

        let embedder: Arc<dyn EmbeddingAdapter> = match config.search.embedder {
            EmbedderSetting::Hashing => Arc::new(HashingEmbedder::new(config.search.dimensions)),
            EmbedderSetting::Ollama => ollama.clone(),
        };

        let mut session = ReasoningSession::new(
            config,
            Collaborators {
                completion: ollama,
                embedder,
                records: records.clone(),
                documents,
            },
        );

        let snapshot_path = PathBuf::from(&config.memory.snapshot_path);
        if tokio::fs::try_exists(&snapshot_path).await.unwrap_or(false) {
            match session.load_memories(&snapshot_path).await {
                Ok(()) => info!(path = %snapshot_path.display(), "memory snapshot restored"),
                Err(e) => warn!(error = %e, "failed to restore memory snapshot, starting empty"),
            }
        }

        Ok(Self {
            session,
            records,
            snapshot_path,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Saves long-term memory to the snapshot path. Failures are logged.
    pub async fn save_snapshot(&mut self) {
        let path = self.snapshot_path.clone();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!(error = %e, dir = %parent.display(), "cannot create snapshot directory");
            return;
        }
        if let Err(e) = self.session.save_memories(&path).await {
            warn!(error = %e, "failed to save memory snapshot");
        }
    }

    /// Indexes the `limit` most recent records for vector search.
    pub async fn index_recent(&self, limit: usize) -> Result<usize, KestrelError> {
        let recent = self.records.get_recent(limit).await?;
        let indexed = self.session.index_records(&recent).await?;
        info!(indexed, "records indexed");
        Ok(indexed)
    }
}
