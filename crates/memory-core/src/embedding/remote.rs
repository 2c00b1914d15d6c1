use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::EmbeddingError;
use super::EmbeddingProvider;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Calls a local Ollama-shaped `/api/embeddings` endpoint. The concrete
/// wire format of the model server is an external collaborator; Ollama's
/// shape is the one named by the config keys (`OLLAMA_BASE_URL`,
/// `OLLAMA_MODEL`).
pub struct RemoteEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl RemoteEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = self.endpoint();
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .timeout(DEFAULT_CALL_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::BadResponse { url, status, body });
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedResponse {
                    reason: e.to_string(),
                })?;

        if parsed.embedding.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: parsed.embedding.len(),
            });
        }

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_one(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self))]
    async fn health_probe(&self) -> Result<(), EmbeddingError> {
        let url = self.endpoint();
        let result = tokio::time::timeout(HEALTH_PROBE_TIMEOUT, self.embed_one("ping")).await;

        match result {
            Ok(inner) => inner.map(|_| ()),
            Err(_) => Err(EmbeddingError::Timeout {
                url,
                deadline_ms: HEALTH_PROBE_TIMEOUT.as_millis() as u64,
            }),
        }
    }
}
