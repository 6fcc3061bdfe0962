//! Search pipeline errors
//!
//! None of these ever reach the agent: `find_code` converts every failure
//! into a degraded, well-formed response. The variants exist so the
//! conversion site can log structured records.

use thiserror::Error;

use codeweaver_providers::ProviderError;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors raised inside the find_code pipeline
#[derive(Error, Debug)]
pub enum SearchError {
    /// Request parameters failed validation
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Neither a dense nor a sparse embedding provider is configured
    #[error("No embedding providers configured")]
    NoEmbeddingProviders,

    /// Both query embeddings failed
    #[error("Both dense and sparse embeddings failed")]
    AllEmbeddingsFailed,

    /// Dense embedding failed with no sparse fallback available
    #[error("Dense embedding failed and no sparse provider available: {0}")]
    DenseFailedNoFallback(String),

    /// No vector store provider is configured
    #[error("No vector store provider configured")]
    NoVectorStore,

    /// Provider call failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}
