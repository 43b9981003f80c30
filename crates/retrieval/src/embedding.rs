//! HTTP embedding client
//!
//! Talks to an Ollama-compatible `/api/embed` endpoint. Vectors are
//! normalized to unit length so index cosine scores land in [-1,1] before
//! the [0,1] remap in the index client.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use podwise_core::{Embedder, Error};
use podwise_config::RetrievalConfig;

use crate::RetrievalError;

/// Embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    /// Expected dimension (D); checked against the backend at startup
    pub dim: usize,
    pub timeout: Duration,
    /// Retry attempts for transient failures (R)
    pub max_retries: u32,
    /// Initial backoff, doubled each retry
    pub initial_backoff: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dim: 768,
            timeout: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl From<&RetrievalConfig> for EmbeddingConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            endpoint: config.embedding_endpoint.clone(),
            model: config.embedding_model.clone(),
            dim: config.embedding_dim,
            timeout: Duration::from_millis(config.embed_timeout_ms),
            max_retries: config.retry_max,
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding client over HTTP
pub struct HttpEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Embed a probe string and verify the backend dimension matches config.
    /// A mismatch with the vector index is a fatal startup error.
    pub async fn probe_dimension(&self) -> Result<(), RetrievalError> {
        let vectors = self.request(&["dimension probe".to_string()]).await?;
        let actual = vectors.first().map(|v| v.len()).unwrap_or(0);
        if actual != self.config.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.config.dim,
                actual,
            });
        }
        Ok(())
    }

    /// One attempt against the backend
    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
        };
        let url = format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::EmbeddingUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::EmbeddingUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::EmbeddingUnavailable(e.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RetrievalError::EmbeddingUnavailable(format!(
                "expected {} vectors, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings.into_iter().map(normalize).collect())
    }

    /// Retry loop with exponential backoff and jitter
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut backoff = self.config.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                let wait = backoff + Duration::from_millis(jitter);
                tracing::warn!(
                    attempt,
                    max = self.config.max_retries,
                    wait_ms = wait.as_millis() as u64,
                    "Embedding request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }

            match self.request_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| RetrievalError::EmbeddingUnavailable("retries exhausted".into())))
    }

    /// Probe for the health registry
    pub async fn is_available(&self) -> bool {
        self.request_once(&["ping".to_string()]).await.is_ok()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.request(texts).await?)
    }

    fn dim(&self) -> usize {
        self.config.dim
    }
}

/// Scale to unit length; zero vectors pass through unchanged
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(vec![3.0, 4.0]);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = RetrievalConfig::default();
        let config = EmbeddingConfig::from(&settings);
        assert_eq!(config.dim, settings.embedding_dim);
        assert_eq!(config.max_retries, settings.retry_max);
    }
}
