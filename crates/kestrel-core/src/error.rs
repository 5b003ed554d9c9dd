// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Kestrel reasoning engine.

use thiserror::Error;

/// The primary error type used across all Kestrel adapter traits and core operations.
#[derive(Debug, Error)]
pub enum KestrelError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Record store errors (database connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Text-completion or embedding backend errors (unreachable, bad status, bad body).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A tool invoked by a reasoning engine failed.
    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Snapshot or index persistence failed (file I/O, JSON encoding).
    #[error("persistence error: {message}")]
    Persistence {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Requested adapter was not found.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Model output could not be parsed into the expected structure.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KestrelError {
    /// Returns true when the error means a collaborator could not be reached
    /// at all, as opposed to answering with something unusable.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            KestrelError::Provider { .. }
                | KestrelError::Timeout { .. }
                | KestrelError::HealthCheckFailed { .. }
                | KestrelError::AdapterNotFound { .. }
        )
    }
}
