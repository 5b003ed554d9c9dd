// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-completion adapter trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::KestrelError;
use crate::traits::adapter::PluginAdapter;

/// An opaque text-completion capability.
///
/// Calls may fail (unreachable backend, timeout); every call site in the
/// engine defines its own fallback.
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Completes `prompt` and returns the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, KestrelError>;
}

/// Runs one completion bounded by `timeout`.
///
/// A hung backend surfaces as [`KestrelError::Timeout`] so the calling
/// stage can fall back instead of blocking the pipeline.
pub async fn complete_within(
    adapter: &dyn CompletionAdapter,
    prompt: &str,
    timeout: Duration,
) -> Result<String, KestrelError> {
    match tokio::time::timeout(timeout, adapter.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(KestrelError::Timeout { duration: timeout }),
    }
}
