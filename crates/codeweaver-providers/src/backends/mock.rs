//! Deterministic mock providers
//!
//! These back the test suite and offline development without model
//! downloads or network access. Embeddings are pure functions of the input
//! text (BLAKE3-derived), so identical text always embeds identically -
//! which is what makes the in-memory store's similarity search exercisable
//! in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;

use codeweaver_chunking::{CodeChunk, SparseVec};
use codeweaver_common::hash::blake_hash;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    EmbeddingProvider, RerankResult, RerankingProvider, SparseEmbeddingProvider,
};

/// Deterministic dense embedder.
pub struct MockEmbedding {
    dimension: usize,
    model: String,
    fail: bool,
}

impl MockEmbedding {
    /// Embedder producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: format!("mock-dense-{dimension}"),
            fail: false,
        }
    }

    /// Configure to fail on every call (for testing error handling).
    #[must_use]
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let digest = blake_hash(text.as_bytes());
        let bytes = digest.as_str().as_bytes();
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|i| {
                let byte = bytes[i % bytes.len()] as f32;
                (byte / 127.5) - 1.0
            })
            .collect();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed_documents(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        if self.fail {
            return Err(ProviderError::Backend(
                "Mock embedder configured to fail".to_string(),
            ));
        }
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<Vec<f32>>> {
        self.embed_documents(&[text]).await
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "mock-embedding"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic sparse embedder: hashed bag-of-words.
pub struct MockSparseEmbedding {
    vocabulary_size: u32,
    fail: bool,
}

impl MockSparseEmbedding {
    /// Embedder hashing tokens into the given vocabulary size.
    pub fn new(vocabulary_size: u32) -> Self {
        Self {
            vocabulary_size: vocabulary_size.max(1),
            fail: false,
        }
    }

    /// Configure to fail on every call (for testing error handling).
    #[must_use]
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    fn embed_one(&self, text: &str) -> ProviderResult<SparseVec> {
        let mut weights: BTreeMap<u32, f32> = BTreeMap::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let digest = blake_hash(token.to_ascii_lowercase().as_bytes());
            let bytes = digest.as_str().as_bytes();
            let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let index = raw % self.vocabulary_size;
            *weights.entry(index).or_insert(0.0) += 1.0;
        }

        let (indices, values): (Vec<u32>, Vec<f32>) = weights.into_iter().unzip();
        SparseVec::new(indices, values)
            .map_err(|e| ProviderError::VectorShape(e.to_string()))
    }
}

#[async_trait]
impl SparseEmbeddingProvider for MockSparseEmbedding {
    async fn embed_documents(&self, texts: &[&str]) -> ProviderResult<Vec<SparseVec>> {
        if self.fail {
            return Err(ProviderError::Backend(
                "Mock sparse embedder configured to fail".to_string(),
            ));
        }
        texts.iter().map(|text| self.embed_one(text)).collect()
    }

    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<SparseVec>> {
        self.embed_documents(&[text]).await
    }

    fn provider_name(&self) -> &str {
        "mock-sparse-embedding"
    }

    fn model_name(&self) -> &str {
        "mock-sparse-bow"
    }
}

/// Word-overlap reranker.
pub struct MockReranker {
    fail: bool,
}

impl MockReranker {
    /// New reranker.
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// Configure to fail on every call (for testing error handling).
    #[must_use]
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankingProvider for MockReranker {
    async fn rerank(&self, query: &str, chunks: &[CodeChunk]) -> ProviderResult<Vec<RerankResult>> {
        if self.fail {
            return Err(ProviderError::Backend(
                "Mock reranker configured to fail".to_string(),
            ));
        }

        let query_words: Vec<String> = query
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect();

        Ok(chunks
            .iter()
            .enumerate()
            .map(|(original_index, chunk)| {
                let content = chunk.content.to_ascii_lowercase();
                let hits = query_words
                    .iter()
                    .filter(|word| content.contains(word.as_str()))
                    .count();
                let score = if query_words.is_empty() {
                    0.0
                } else {
                    hits as f32 / query_words.len() as f32
                };
                RerankResult {
                    original_index,
                    score,
                }
            })
            .collect())
    }

    fn provider_name(&self) -> &str {
        "mock-reranker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_chunking::{ChunkSource, Span};
    use codeweaver_grammar::ExtKind;
    use uuid::Uuid;

    fn chunk(content: &str) -> CodeChunk {
        CodeChunk::new(
            content,
            Span::new(1, 1, Uuid::now_v7()).unwrap(),
            "a.rs",
            ExtKind::from_extension("rs"),
            ChunkSource::SemanticAst,
        )
    }

    #[tokio::test]
    async fn test_dense_embeddings_are_deterministic_and_normalized() {
        let embedder = MockEmbedding::new(768);
        let a = embedder.embed_documents(&["fn main() {}"]).await.unwrap();
        let b = embedder.embed_query("fn main() {}").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 768);

        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        let c = embedder.embed_query("something else").await.unwrap();
        assert_ne!(a[0], c[0]);
    }

    #[tokio::test]
    async fn test_sparse_embeddings_have_valid_shape() {
        let embedder = MockSparseEmbedding::new(30_000);
        let batch = embedder
            .embed_documents(&["let x = foo(bar, baz)"])
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        let sparse = &batch[0];
        assert!(!sparse.is_empty());
        assert!(sparse.indices().windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_reranker_scores_overlap() {
        let reranker = MockReranker::new();
        let chunks = vec![chunk("authentication token handler"), chunk("fft butterfly")];
        let results = reranker.rerank("authentication token", &chunks).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].original_index, 0);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        assert!(
            MockEmbedding::new(8)
                .with_failure()
                .embed_query("x")
                .await
                .is_err()
        );
        assert!(
            MockSparseEmbedding::new(100)
                .with_failure()
                .embed_query("x")
                .await
                .is_err()
        );
        assert!(
            MockReranker::new()
                .with_failure()
                .rerank("x", &[])
                .await
                .is_err()
        );
    }
}
