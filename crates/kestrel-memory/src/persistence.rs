// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable save/load of long-term memory snapshots.

use std::path::Path;

use async_trait::async_trait;
use kestrel_core::KestrelError;
use tracing::{debug, info};

use crate::types::MemorySnapshot;

/// Stores and retrieves full [`MemorySnapshot`]s.
#[async_trait]
pub trait MemoryPersistence: Send + Sync {
    /// Writes `snapshot` to `path`, replacing any previous snapshot.
    async fn save(&self, path: &Path, snapshot: &MemorySnapshot) -> Result<(), KestrelError>;

    /// Reads the snapshot at `path`. A missing file is an error.
    async fn load(&self, path: &Path) -> Result<MemorySnapshot, KestrelError>;
}

/// Pretty-printed JSON files written through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFilePersistence;

#[async_trait]
impl MemoryPersistence for JsonFilePersistence {
    async fn save(&self, path: &Path, snapshot: &MemorySnapshot) -> Result<(), KestrelError> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| KestrelError::Persistence {
            message: format!("failed to encode memory snapshot: {e}"),
            source: Some(Box::new(e)),
        })?;
        write_atomically(path, &json).await?;
        info!(
            path = %path.display(),
            insights = snapshot.insights.len(),
            patterns = snapshot.patterns.len(),
            summaries = snapshot.summaries.len(),
            "memories saved"
        );
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<MemorySnapshot, KestrelError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| KestrelError::Persistence {
                message: format!("failed to read memory snapshot {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;
        let snapshot: MemorySnapshot =
            serde_json::from_slice(&bytes).map_err(|e| KestrelError::Persistence {
                message: format!("failed to decode memory snapshot {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;
        info!(
            path = %path.display(),
            insights = snapshot.insights.len(),
            patterns = snapshot.patterns.len(),
            summaries = snapshot.summaries.len(),
            "memories loaded"
        );
        Ok(snapshot)
    }
}

/// Writes `bytes` to a sibling temp file, then renames it over `path`.
///
/// Parent directories are created as needed.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), KestrelError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| persistence_io(path, "create parent directory for", e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| persistence_io(&tmp, "write", e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| persistence_io(path, "replace", e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "file written");
    Ok(())
}

fn persistence_io(path: &Path, action: &str, e: std::io::Error) -> KestrelError {
    KestrelError::Persistence {
        message: format!("failed to {action} {}: {e}", path.display()),
        source: Some(Box::new(e)),
    }
}
