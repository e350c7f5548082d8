use thiserror::Error;

/// Errors surfaced by rerank backends.
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("rerank service not configured")]
    Disabled,

    #[error("rerank request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("rerank service returned status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("rerank response malformed: {reason}")]
    MalformedResponse { reason: String },
}
