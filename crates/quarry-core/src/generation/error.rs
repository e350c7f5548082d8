use thiserror::Error;

/// Errors surfaced by the generation backends.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("provider stream failed: {0}")]
    Stream(String),

    #[error("provider returned an empty completion")]
    EmptyCompletion,
}
