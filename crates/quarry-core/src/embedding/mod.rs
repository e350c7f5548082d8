//! Embedding service clients.
//!
//! The online path embeds query text only; corpus embeddings are produced
//! offline by the ingestion pipeline. [`HttpEmbedder`] talks to an
//! OpenAI-style `/v1/embeddings` endpoint; [`StubEmbedder`] provides a
//! deterministic replacement for tests and mock builds.

pub mod error;

pub use error::EmbeddingError;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Maps text to a fixed-length vector. Deterministic for identical text and
/// model version.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single text. The returned vector is L2-normalized.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// The embedding dimension this backend produces.
    fn dimension(&self) -> usize;

    /// `true` when this backend is a deterministic stand-in, not a model.
    fn is_stub(&self) -> bool {
        false
    }
}

/// L2-normalizes a vector in place; zero vectors are left untouched.
pub fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Embedding client for an OpenAI-style `/v1/embeddings` endpoint.
///
/// Transient failures (connection errors, 429, 5xx) are retried once after
/// a short backoff; anything else fails the request.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            model: model.into(),
            dimension,
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedResponse {
                    reason: e.to_string(),
                })?;

        let mut embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::MalformedResponse {
                reason: "empty data array".to_string(),
            })?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        normalize_l2(&mut embedding);
        Ok(embedding)
    }

    fn is_transient(err: &EmbeddingError) -> bool {
        match err {
            EmbeddingError::Request(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self.request(text).await {
            Ok(v) => Ok(v),
            Err(e) if Self::is_transient(&e) => {
                warn!(error = %e, "Transient embedding failure, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.request(text).await
            }
            Err(e) => Err(e),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Deterministic hash-based embedder for tests and mock builds.
///
/// Vectors are derived from a BLAKE3 XOF over the input text, then
/// L2-normalized: equal texts map to equal unit vectors, and token-sharing
/// texts are no more similar than random ones. Good enough to exercise the
/// pipeline's data flow, not its semantics.
#[cfg(any(test, feature = "mock"))]
pub struct StubEmbedder {
    dimension: usize,
}

#[cfg(any(test, feature = "mock"))]
impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embeds synchronously; shared by the async trait impl and offline
    /// artifact builders in tests.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut reader = hasher.finalize_xof();
        let mut bytes = vec![0u8; self.dimension * 4];
        reader.fill(&mut bytes);

        let mut v: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| {
                let raw = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                // Map to [-1, 1).
                (raw as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        normalize_l2(&mut v);
        v
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tracing::debug!(text_len = text.len(), "Stub embedding");
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_stub(&self) -> bool {
        true
    }
}
