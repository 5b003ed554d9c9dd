// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store and document corpus adapters for Kestrel.
//!
//! Provides a WAL-mode SQLite [`SqliteRecordStore`] with embedded
//! migrations, all access serialized through `tokio-rusqlite`'s background
//! thread, and a filesystem [`KeywordDocumentIndex`] over `.txt` and `.md`
//! manuals.

pub mod database;
pub mod documents;
pub mod migrations;
pub mod records;

pub use database::Database;
pub use documents::KeywordDocumentIndex;
pub use records::SqliteRecordStore;
