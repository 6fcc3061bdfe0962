//! Provider kind and identifier tags

use serde::{Deserialize, Serialize};

/// Abstract category tag identifying what role a backend plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Embedding,
    SparseEmbedding,
    Reranking,
    VectorStore,
    Agent,
    Data,
}

impl ProviderKind {
    /// Stable lowercase name, matching configuration keys.
    pub fn name(self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::SparseEmbedding => "sparse_embedding",
            Self::Reranking => "reranking",
            Self::VectorStore => "vector_store",
            Self::Agent => "agent",
            Self::Data => "data",
        }
    }

    /// Parse from a configuration key.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "embedding" => Some(Self::Embedding),
            "sparse_embedding" => Some(Self::SparseEmbedding),
            "reranking" => Some(Self::Reranking),
            "vector_store" => Some(Self::VectorStore),
            "agent" => Some(Self::Agent),
            "data" => Some(Self::Data),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a concrete backend.
///
/// Built-in backends get variants; anything else flows through `Custom` so
/// user registrations don't need to touch this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    /// In-memory vector store with optional JSON persistence
    Memory,
    /// Qdrant vector store
    Qdrant,
    /// Deterministic dense embedder for tests and offline use
    MockEmbedding,
    /// Deterministic sparse embedder for tests and offline use
    MockSparseEmbedding,
    /// Pass-through reranker for tests and offline use
    MockReranker,
    /// Externally registered backend
    #[serde(untagged)]
    Custom(String),
}

impl ProviderId {
    /// Stable identifier string, matching configuration values.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Memory => "memory",
            Self::Qdrant => "qdrant",
            Self::MockEmbedding => "mock-embedding",
            Self::MockSparseEmbedding => "mock-sparse-embedding",
            Self::MockReranker => "mock-reranker",
            Self::Custom(name) => name,
        }
    }

    /// Parse from a configuration value.
    pub fn parse(name: &str) -> Self {
        match name {
            "memory" => Self::Memory,
            "qdrant" => Self::Qdrant,
            "mock-embedding" => Self::MockEmbedding,
            "mock-sparse-embedding" => Self::MockSparseEmbedding,
            "mock-reranker" => Self::MockReranker,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
