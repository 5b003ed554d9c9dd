// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock text-completion adapter for deterministic testing.
//!
//! `MockCompletion` implements `CompletionAdapter` with pre-configured
//! responses, so engine tests run without a model backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kestrel_core::{AdapterType, CompletionAdapter, HealthStatus, KestrelError, PluginAdapter};

/// A mock completion backend.
///
/// Resolution order for each call:
/// 1. fail if switched to failing
/// 2. the first rule whose marker occurs in the prompt
/// 3. the next queued response (FIFO)
/// 4. the default response
pub struct MockCompletion {
    responses: Mutex<VecDeque<String>>,
    rules: Vec<(String, String)>,
    default_response: String,
    failing: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    /// Create a mock with an empty queue and a `"mock response"` default.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            default_response: "mock response".to_string(),
            failing: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            ..Self::new()
        }
    }

    /// Create a mock whose every call fails as an unreachable backend.
    pub fn unavailable() -> Self {
        let mock = Self::new();
        mock.failing.store(true, Ordering::SeqCst);
        mock
    }

    /// Answer every prompt containing `marker` with `response`.
    pub fn with_rule(mut self, marker: &str, response: &str) -> Self {
        self.rules.push((marker.to_string(), response.to_string()));
        self
    }

    pub fn with_default(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a response to the end of the queue.
    pub async fn add_response(&self, text: &str) {
        self.responses.lock().await.push_back(text.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `complete` calls so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    async fn next_response(&self, prompt: &str) -> String {
        if let Some((_, response)) = self.rules.iter().find(|(marker, _)| prompt.contains(marker)) {
            return response.clone();
        }
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        if self.failing.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("mock switched to failing".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, KestrelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(KestrelError::Provider {
                message: "mock backend unavailable".into(),
                source: None,
            });
        }
        Ok(self.next_response(prompt).await)
    }
}
