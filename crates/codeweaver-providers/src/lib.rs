//! CodeWeaver provider abstraction crate
//!
//! Provider kinds, the trait surfaces the pipeline consumes, a lazy factory
//! registry with singleton caching, and the built-in backends: an in-memory
//! vector store (with optional JSON persistence), a Qdrant store, and
//! deterministic mock embedders/rerankers for tests and offline use.

pub mod backends;
pub mod error;
pub mod kinds;
pub mod registry;
pub mod traits;

pub use backends::memory::InMemoryVectorStore;
pub use backends::mock::{MockEmbedding, MockReranker, MockSparseEmbedding};
#[cfg(feature = "qdrant")]
pub use backends::qdrant::QdrantVectorStore;
pub use error::{ProviderError, ProviderResult};
pub use kinds::{ProviderId, ProviderKind};
pub use registry::{FactoryContext, ProviderFactory, ProviderInstance, ProviderRegistry};
pub use traits::{
    DENSE_VECTOR_NAME, EmbeddingProvider, MAX_SEARCH_CANDIDATES, QueryVector, RerankResult,
    RerankingProvider, SPARSE_VECTOR_NAME, SearchFilter, SparseEmbeddingProvider, StoredPoint,
    StoredVectors, VectorData, VectorStoreProvider, chunk_from_payload, chunk_payload,
};
