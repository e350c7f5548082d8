use thiserror::Error;

use crate::embedding::EmbeddingError;

/// Errors that abort retrieval for a request.
///
/// Single-source failures and empty evidence sets are not errors; they
/// degrade inside the retriever and surface through the metrics.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("both retrieval sources failed")]
    AllSourcesFailed,
}
