//! Error types for provider operations

use thiserror::Error;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by the provider registry and concrete backends
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider selection/registration problems; the affected subsystem
    /// refuses to start
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No factory registered for the requested (kind, id) pair
    #[error("Provider '{provider}' is not registered for kind '{kind}'")]
    NotRegistered { kind: String, provider: String },

    /// Backend API errors; retried with backoff, then surfaced at file
    /// granularity
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend signalled rate limiting
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A provider call exceeded its timeout
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Vector shape mismatch (wrong dimension, malformed sparse pair)
    #[error("Vector shape error: {0}")]
    VectorShape(String),

    /// Serialization of payloads or persisted snapshots failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General I/O errors (persisted snapshots)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::RateLimited(_) | Self::Timeout { .. } | Self::Io(_)
        )
    }
}
