use std::time::Duration;

/// Configuration for the HTTP rerank client.
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Rerank service endpoint.
    pub url: String,
    /// Cross-encoder model identifier sent with each request.
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RerankerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
