//! Error types for the indexing crate
//!
//! Recovery policy, not type taxonomy, drives handling: file-scope errors
//! never abort batches, batch-scope errors never abort the run, and only
//! manifest/checkpoint write failures are fatal.

use thiserror::Error;

use codeweaver_chunking::ChunkingError;
use codeweaver_providers::ProviderError;

/// Result type alias for indexing operations
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Errors raised by the indexing pipeline
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Missing or unresolvable provider/settings; the subsystem refuses to
    /// start
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend provider failure (already retried with backoff)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Chunking invariant violation
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Manifest could not be written - fatal
    #[error("Manifest write failed: {0}")]
    ManifestWrite(String),

    /// Checkpoint could not be written - fatal
    #[error("Checkpoint write failed: {0}")]
    CheckpointWrite(String),

    /// Serialization of persisted state failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("Indexing error: {0}")]
    Other(String),
}

impl IndexingError {
    /// Whether the error must abort the whole run (spec: only persisted
    /// state corruption is fatal).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ManifestWrite(_) | Self::CheckpointWrite(_))
    }
}
