// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Kestrel integration tests.
//!
//! Provides mock collaborators and a test harness for fast, deterministic
//! tests without a model backend or a database.
//!
//! # Components
//!
//! - [`MockCompletion`] - Mock text-completion backend with rules and a FIFO queue
//! - [`MockRecordStore`] - In-memory record store with configurable statistics
//! - [`MockDocuments`] - Fixed document search hits
//! - [`TestHarness`] - A reasoning session wired to the mocks

pub mod harness;
pub mod mock_completion;
pub mod mock_store;

pub use harness::TestHarness;
pub use mock_completion::MockCompletion;
pub use mock_store::{MockDocuments, MockRecordStore};
