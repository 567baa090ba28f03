//! Embedding client: text → fixed-width vector (spec §4.C2).

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitState;
use crate::clients::ServiceClient;
use crate::config::EMBEDDING_DIMENSION;
use crate::error::{Error, Result};

/// Health of the embedding service as reported by [`EmbeddingProvider::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingHealthStatus {
    /// Last probe succeeded and the breaker is closed.
    Ok,
    /// The breaker is open or the last probe failed.
    NotReady,
}

/// Result of an embedding-service health probe.
#[derive(Debug, Clone)]
pub struct EmbeddingHealth {
    /// Aggregate health status.
    pub status: EmbeddingHealthStatus,
    /// Observed latency of the probe.
    pub latency: std::time::Duration,
    /// Breaker state at probe time.
    pub breaker_state: CircuitState,
}

/// Stateless text-to-vector embedding interface. Callers that get
/// [`Error::EmbeddingUnavailable`] or a breaker-open error must fall back to
/// non-vector behavior rather than propagate failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts in one call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Checks health without requiring a real embedding.
    async fn health_check(&self) -> EmbeddingHealth;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedBatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vector: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedBatchResponse {
    vectors: Vec<Vec<f32>>,
}

/// HTTP-backed [`EmbeddingProvider`].
pub struct HttpEmbeddingProvider {
    client: ServiceClient,
}

impl HttpEmbeddingProvider {
    /// Wraps an already-configured [`ServiceClient`].
    #[must_use]
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    fn validate_dimension(vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(Error::EmbeddingDimensionMismatch { expected: EMBEDDING_DIMENSION, actual: vector.len() });
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest { text };
        let response: Option<EmbedResponse> =
            self.client.request_json(Method::POST, "/embed", Some(&request)).await.map_err(|e| {
                if matches!(e, Error::Timeout { .. } | Error::CircuitBroken { .. }) {
                    Error::EmbeddingUnavailable(e.to_string())
                } else {
                    e
                }
            })?;
        let response = response.ok_or_else(|| Error::EmbeddingUnavailable("no response body".into()))?;
        Self::validate_dimension(response.vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedBatchRequest { texts };
        let response: Option<EmbedBatchResponse> =
            self.client.request_json(Method::POST, "/embed/batch", Some(&request)).await.map_err(|e| {
                if matches!(e, Error::Timeout { .. } | Error::CircuitBroken { .. }) {
                    Error::EmbeddingUnavailable(e.to_string())
                } else {
                    e
                }
            })?;
        let response = response.ok_or_else(|| Error::EmbeddingUnavailable("no response body".into()))?;
        response.vectors.into_iter().map(Self::validate_dimension).collect()
    }

    async fn health_check(&self) -> EmbeddingHealth {
        let start = std::time::Instant::now();
        let probe = self.embed("health-check").await;
        let breaker_state = self.client.breaker_state().await;
        EmbeddingHealth {
            status: if probe.is_ok() { EmbeddingHealthStatus::Ok } else { EmbeddingHealthStatus::NotReady },
            latency: start.elapsed(),
            breaker_state,
        }
    }
}

/// Deterministic in-process embedding used by tests and offline runs: hashes
/// the input text into a fixed-dimension vector so identical text always
/// embeds identically, without requiring the real embedding service.
pub struct DeterministicEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; EMBEDDING_DIMENSION];
        for (i, byte) in text.bytes().enumerate() {
            let slot = i % EMBEDDING_DIMENSION;
            vector[slot] += f32::from(byte) / 255.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn health_check(&self) -> EmbeddingHealth {
        EmbeddingHealth {
            status: EmbeddingHealthStatus::Ok,
            latency: std::time::Duration::from_millis(0),
            breaker_state: CircuitState::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_provider_is_stable_and_correctly_sized() {
        let provider = DeterministicEmbeddingProvider;
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIMENSION);
    }

    #[tokio::test]
    async fn deterministic_provider_distinguishes_different_text() {
        let provider = DeterministicEmbeddingProvider;
        let a = provider.embed("alpha").await.unwrap();
        let b = provider.embed("beta").await.unwrap();
        assert_ne!(a, b);
    }
}
