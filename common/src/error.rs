use async_openai::error::OpenAIError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Vector store files not found: {0}")]
    IndexNotFound(String),
    #[error("Vector store is empty; add chunks before searching")]
    EmptyStore,
    #[error("Generative quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("Generative call failed: {0}")]
    Generation(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures that a bounded backoff can reasonably recover from.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::QuotaExhausted(_))
    }
}
