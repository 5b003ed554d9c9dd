// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama adapter for the Kestrel reasoning engine.
//!
//! [`OllamaClient`] implements both [`CompletionAdapter`] (via
//! `/api/generate`) and [`EmbeddingAdapter`] (via `/api/embed`) against a
//! local Ollama server.

pub mod client;
pub mod types;

pub use client::OllamaClient;

use async_trait::async_trait;
use kestrel_core::{
    AdapterType, CompletionAdapter, EmbeddingAdapter, HealthStatus, KestrelError, PluginAdapter,
};
use tracing::debug;

#[async_trait]
impl PluginAdapter for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        match self.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        debug!("Ollama client shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, KestrelError> {
        self.generate(prompt).await
    }
}

#[async_trait]
impl EmbeddingAdapter for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KestrelError> {
        self.embed_texts(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_config::model::OllamaConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn health_check_reports_server_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": []
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&OllamaConfig {
            base_url: format!("{}/", server.uri()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.name(), "ollama");
        assert_eq!(client.health_check().await.unwrap(), HealthStatus::Healthy);

        let down = OllamaClient::new(&OllamaConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            down.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn completion_adapter_delegates_to_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "7 inspections",
                "done": true
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&OllamaConfig {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        let adapter: &dyn CompletionAdapter = &client;
        assert_eq!(adapter.complete("how many").await.unwrap(), "7 inspections");
    }
}
