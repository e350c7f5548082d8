use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while loading or searching the precomputed indices.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index artifact not found: {path}")]
    ArtifactNotFound { path: PathBuf },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest parse error: {0}")]
    ManifestParse(#[from] serde_json::Error),

    #[error(
        "embedding matrix size mismatch: {actual_bytes} bytes for {rows} rows x {dim} dims"
    )]
    MatrixSizeMismatch {
        actual_bytes: usize,
        rows: usize,
        dim: usize,
    },

    #[error("query dimension mismatch: expected {expected}, got {actual}")]
    QueryDimensionMismatch { expected: usize, actual: usize },

    #[error("lexical index error: {0}")]
    Lexical(#[from] tantivy::TantivyError),

    #[error("lexical query parse error: {0}")]
    LexicalQuery(#[from] tantivy::query::QueryParserError),
}
