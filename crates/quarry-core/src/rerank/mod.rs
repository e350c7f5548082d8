//! Cross-encoder reranking.
//!
//! A reranker scores a (query, passage) pair jointly and dominates the
//! fused ordering for the candidates it sees. The model runs out of
//! process behind [`HttpReranker`] so slow scoring never serializes
//! unrelated requests; [`StubReranker`] is the deterministic stand-in for
//! tests and mock builds.

pub mod config;
pub mod error;

pub use config::RerankerConfig;
pub use error::RerankError;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// Stateless joint scorer for (query, passage) pairs.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns a calibrated relevance score for the pair; pure function of
    /// its inputs.
    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError>;

    /// `true` when this backend is a deterministic stand-in, not a model.
    fn is_stub(&self) -> bool {
        false
    }
}

const RETRY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(250);

/// Client for an out-of-process cross-encoder scoring service.
pub struct HttpReranker {
    client: reqwest::Client,
    config: RerankerConfig,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    relevance_score: f32,
}

impl HttpReranker {
    pub fn new(config: RerankerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn request(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "query": query,
            "documents": [passage],
        });

        let response = self.client.post(&self.config.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RerankError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RerankResponse =
            response
                .json()
                .await
                .map_err(|e| RerankError::MalformedResponse {
                    reason: e.to_string(),
                })?;

        parsed
            .results
            .first()
            .map(|r| r.relevance_score)
            .ok_or_else(|| RerankError::MalformedResponse {
                reason: "empty results array".to_string(),
            })
    }

    fn is_transient(err: &RerankError) -> bool {
        match err {
            RerankError::Request(e) => e.is_timeout() || e.is_connect(),
            RerankError::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        match self.request(query, passage).await {
            Ok(score) => Ok(score),
            Err(e) if Self::is_transient(&e) => {
                warn!(error = %e, "Transient rerank failure, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.request(query, passage).await
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for HttpReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReranker")
            .field("url", &self.config.url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Used when no rerank service is configured: every score call reports
/// [`RerankError::Disabled`] and the retriever degrades to the
/// fused/tiered ordering.
#[derive(Debug, Default)]
pub struct DisabledReranker;

#[async_trait]
impl Reranker for DisabledReranker {
    async fn score(&self, _query: &str, _passage: &str) -> Result<f32, RerankError> {
        Err(RerankError::Disabled)
    }
}

/// Deterministic token-overlap reranker for tests and mock builds.
///
/// Scores the fraction of query tokens present in the passage, so test
/// fixtures can steer the ordering with plain text.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct StubReranker;

#[cfg(any(test, feature = "mock"))]
impl StubReranker {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl Reranker for StubReranker {
    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        let query_tokens: std::collections::HashSet<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if query_tokens.is_empty() {
            return Ok(0.0);
        }

        let passage_tokens: std::collections::HashSet<String> = passage
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let overlap = query_tokens.intersection(&passage_tokens).count();
        let score = overlap as f32 / query_tokens.len() as f32;
        tracing::debug!(score, "Stub rerank score");
        Ok(score)
    }

    fn is_stub(&self) -> bool {
        true
    }
}
