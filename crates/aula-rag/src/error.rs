//! Error types for the assistant core

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Assistant core errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (unknown provider kind, missing credential) - fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unreadable or unparseable source document - skip the source, continue the batch
    #[error("Failed to read source '{source_id}': {message}")]
    Read { source_id: String, message: String },

    /// Embedding length does not match the index dimensionality - never truncated or padded
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider signalled a rate limit - long cooldown, then retry
    #[error("Provider rate limit: {0}")]
    RateLimited(String),

    /// Transient network or timeout failure - short exponential backoff, then retry
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Non-transient provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Missing or corrupt persisted index - degrade to an empty index
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a source read error
    pub fn read(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create an index-unavailable error
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    /// Rate-limit signal (gets the long cooldown during ingestion)
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }

    /// Source read failure (never retried - the file will not get healthier)
    pub fn is_read(&self) -> bool {
        matches!(self, Error::Read { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::Transient(err.to_string())
        } else {
            Error::Provider(err.to_string())
        }
    }
}
