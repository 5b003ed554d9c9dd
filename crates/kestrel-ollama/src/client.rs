// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Ollama native API.
//!
//! Provides [`OllamaClient`], which posts JSON to a local Ollama server and
//! retries transient errors.

use std::time::Duration;

use kestrel_config::model::OllamaConfig;
use kestrel_core::KestrelError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    ApiErrorResponse, EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse,
};

/// Pause before each retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for Ollama communication.
///
/// Handles connection pooling and retry logic for transient errors
/// (429, 500, 503, 529).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
    max_retries: u32,
}

impl OllamaClient {
    /// Creates a client from the `[ollama]` configuration section.
    pub fn new(config: &OllamaConfig) -> Result<Self, KestrelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KestrelError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Returns the completion model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Generates a completion for `prompt` without streaming.
    pub async fn generate(&self, prompt: &str) -> Result<String, KestrelError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };
        let response: GenerateResponse = self.post_json("/api/generate", &request).await?;
        debug!(
            model = %self.model,
            eval_count = response.eval_count.unwrap_or_default(),
            done = response.done,
            "generation complete"
        );
        Ok(response.response)
    }

    /// Embeds `texts` with the embedding model, one vector per input.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KestrelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbedRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };
        let response: EmbedResponse = self.post_json("/api/embed", &request).await?;
        if response.embeddings.len() != texts.len() {
            return Err(KestrelError::Provider {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    response.embeddings.len()
                ),
                source: None,
            });
        }
        Ok(response.embeddings)
    }

    /// Checks that the server answers `GET /api/tags`.
    pub async fn ping(&self) -> Result<(), KestrelError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| KestrelError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(KestrelError::Provider {
                message: format!("Ollama returned {status}"),
                source: None,
            })
        }
    }

    /// Posts `body` to `path`, retrying transient statuses after a delay.
    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, KestrelError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying Ollama request after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| KestrelError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, path, "Ollama response received");

            if status.is_success() {
                let text = response.text().await.map_err(|e| KestrelError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&text).map_err(|e| KestrelError::Provider {
                    message: format!("failed to parse Ollama response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!("Ollama error ({status}): {}", api_err.error),
                Err(_) => format!("Ollama returned {status}: {text}"),
            };

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %text, "transient error, will retry");
                last_error = Some(KestrelError::Provider {
                    message,
                    source: None,
                });
                continue;
            }

            return Err(KestrelError::Provider {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| KestrelError::Provider {
            message: "Ollama request failed after retries".into(),
            source: None,
        }))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
