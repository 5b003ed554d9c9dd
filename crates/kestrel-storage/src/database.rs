// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management: PRAGMA setup, migrations, and shutdown.
//!
//! All access goes through one `tokio_rusqlite::Connection`, whose single
//! background thread serializes every call.

use std::path::Path;
use std::time::Duration;

use kestrel_core::KestrelError;
use tracing::{debug, warn};

use crate::migrations::run_migrations;

/// Maps a tokio-rusqlite error to a storage error.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> KestrelError {
    KestrelError::Storage {
        source: Box::new(e),
    }
}

/// An open, migrated inspections database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, KestrelError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KestrelError::Storage {
                    source: Box::new(e),
                })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| KestrelError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "inspections database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, KestrelError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| KestrelError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), KestrelError> {
        let journal = self
            .conn
            .call(move |conn| {
                conn.busy_timeout(Duration::from_secs(5))?;
                let journal = if wal_mode {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                        row.get::<_, String>(0)
                    })?
                } else {
                    String::new()
                };
                Ok(journal)
            })
            .await
            .map_err(map_tr_err)?;
        if wal_mode && !journal.eq_ignore_ascii_case("wal") {
            warn!(journal_mode = %journal, "WAL mode not available for this database");
        }

        self.conn
            .call(|conn| Ok(run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;
        Ok(())
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), KestrelError> {
        self.conn
            .call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}
