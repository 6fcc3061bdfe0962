//! Provider trait abstractions
//!
//! Each provider kind is a sealed-surface trait with the minimal operations
//! the pipeline consumes. Concrete backends implement the trait; binding
//! happens through the registry's factory table, never string lookups at
//! call sites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use codeweaver_chunking::{ChunkSource, CodeChunk, SearchResult, SparseVec, Span};
use codeweaver_grammar::{ExtKind, SemanticClass, SemanticSearchLanguage};

use crate::error::{ProviderError, ProviderResult};

/// Name of the default (unnamed) dense vector slot.
pub const DENSE_VECTOR_NAME: &str = "";

/// Name of the sparse vector slot.
pub const SPARSE_VECTOR_NAME: &str = "sparse";

/// Maximum candidates a vector store returns per search.
pub const MAX_SEARCH_CANDIDATES: usize = 100;

/// Trait for dense embedding providers
///
/// Results are shaped as batches: `embed_query` returns a batch of one row
/// which callers unwrap.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of document texts, one row per input.
    async fn embed_documents(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>>;

    /// Generate an embedding for a query, as a batch of one.
    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<Vec<f32>>>;

    /// Dimensionality of produced vectors.
    fn embedding_dimension(&self) -> usize;

    /// Backend identifier for manifests and logs.
    fn provider_name(&self) -> &str;

    /// Model identifier for manifests and logs.
    fn model_name(&self) -> &str;
}

/// Trait for sparse embedding providers
#[async_trait]
pub trait SparseEmbeddingProvider: Send + Sync {
    /// Generate sparse embeddings for a batch of document texts.
    async fn embed_documents(&self, texts: &[&str]) -> ProviderResult<Vec<SparseVec>>;

    /// Generate a sparse embedding for a query, as a batch of one.
    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<SparseVec>>;

    /// Backend identifier for manifests and logs.
    fn provider_name(&self) -> &str;

    /// Model identifier for manifests and logs.
    fn model_name(&self) -> &str;
}

/// One reranked candidate, pointing back at its pre-rerank position.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    /// Index into the candidate list handed to `rerank`
    pub original_index: usize,
    /// Cross-encoder relevance score
    pub score: f32,
}

/// Trait for reranking providers
#[async_trait]
pub trait RerankingProvider: Send + Sync {
    /// Score candidate chunks against a query. The result order is
    /// backend-defined; `original_index` ties each row to its input.
    async fn rerank(&self, query: &str, chunks: &[CodeChunk]) -> ProviderResult<Vec<RerankResult>>;

    /// Backend identifier for logs.
    fn provider_name(&self) -> &str;
}

/// Query vector shapes accepted by `VectorStoreProvider::search`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    /// Dense-only search against the default slot
    Dense(Vec<f32>),
    /// Sparse-only search against the `sparse` slot
    Sparse(SparseVec),
    /// Hybrid search; backends report both per-slot scores
    Hybrid { dense: Vec<f32>, sparse: SparseVec },
}

/// One stored vector value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VectorData {
    /// Dense vector
    Dense(Vec<f32>),
    /// Sparse vector
    Sparse(SparseVec),
}

/// The vector field of a stored point.
///
/// Two wire shapes exist: the named map keyed by vector name, and the bare
/// list form that denotes a single dense vector under the default slot.
/// Reconciliation inspects this shape to confirm which embeddings a point
/// actually has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredVectors {
    /// Bare dense vector (default slot only)
    Bare(Vec<f32>),
    /// Named vector map
    Named(BTreeMap<String, VectorData>),
}

impl StoredVectors {
    /// Whether a dense vector is present (bare form, or the default slot of
    /// the named form).
    pub fn has_dense(&self) -> bool {
        match self {
            Self::Bare(v) => !v.is_empty(),
            Self::Named(map) => matches!(map.get(DENSE_VECTOR_NAME), Some(VectorData::Dense(v)) if !v.is_empty()),
        }
    }

    /// Whether a sparse vector is present under the `sparse` slot.
    pub fn has_sparse(&self) -> bool {
        matches!(
            self,
            Self::Named(map) if matches!(map.get(SPARSE_VECTOR_NAME), Some(VectorData::Sparse(v)) if !v.is_empty())
        )
    }

    /// The dense vector, if present.
    pub fn dense(&self) -> Option<&Vec<f32>> {
        match self {
            Self::Bare(v) => Some(v),
            Self::Named(map) => match map.get(DENSE_VECTOR_NAME) {
                Some(VectorData::Dense(v)) => Some(v),
                _ => None,
            },
        }
    }

    /// The sparse vector, if present.
    pub fn sparse(&self) -> Option<&SparseVec> {
        match self {
            Self::Named(map) => match map.get(SPARSE_VECTOR_NAME) {
                Some(VectorData::Sparse(v)) => Some(v),
                _ => None,
            },
            Self::Bare(_) => None,
        }
    }
}

/// A stored point as retrieved from the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    /// The chunk id
    pub id: Uuid,
    /// The payload projection (see `chunk_payload`)
    pub payload: BTreeMap<String, serde_json::Value>,
    /// Stored vectors
    pub vectors: StoredVectors,
}

/// Post-search filter. v0.1 over-fetches and filters in the pipeline, so
/// backends may ignore this; it exists so the search signature is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Restrict to chunks whose payload language matches
    pub language: Option<SemanticSearchLanguage>,
    /// Restrict to chunks whose file path contains this substring
    pub path_contains: Option<String>,
}

/// Trait for vector storage backends
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Idempotently store chunks (keyed by chunk id) with their embeddings
    /// and payload. Chunks without any embedding are skipped.
    ///
    /// Returns the number of points written.
    async fn upsert(&self, chunks: &[CodeChunk]) -> ProviderResult<usize>;

    /// Remove all points whose payload file path matches.
    ///
    /// Returns the number of points removed, when the backend reports it.
    async fn delete_by_file(&self, path: &Path) -> ProviderResult<usize>;

    /// Search for candidates. Returns up to [`MAX_SEARCH_CANDIDATES`]
    /// results; callers must not rely on ordering.
    async fn search(
        &self,
        vector: QueryVector,
        filter: Option<SearchFilter>,
    ) -> ProviderResult<Vec<SearchResult>>;

    /// Merge the given vectors into existing points. `ids` and `vectors`
    /// are parallel; each map carries only the slots to update.
    async fn update_vectors(
        &self,
        ids: &[Uuid],
        vectors: Vec<BTreeMap<String, VectorData>>,
    ) -> ProviderResult<usize>;

    /// Fetch stored points by id, with payloads and vectors.
    async fn retrieve(&self, ids: &[Uuid]) -> ProviderResult<Vec<StoredPoint>>;

    /// Backend identifier for logs.
    fn provider_name(&self) -> &str;
}

/// Build the payload projection for a chunk (spec'd storage shape shared by
/// every backend).
pub fn chunk_payload(chunk: &CodeChunk) -> BTreeMap<String, serde_json::Value> {
    let mut payload = BTreeMap::new();
    payload.insert("text".to_string(), serde_json::json!(chunk.content));
    payload.insert(
        "file_path".to_string(),
        serde_json::json!(chunk.file_path.to_string_lossy()),
    );
    if let Some(language) = chunk.language {
        payload.insert("language".to_string(), serde_json::json!(language.name()));
    }
    payload.insert(
        "line_start".to_string(),
        serde_json::json!(chunk.line_range.start_line),
    );
    payload.insert(
        "line_end".to_string(),
        serde_json::json!(chunk.line_range.end_line),
    );
    if let Ok(ext_kind) = serde_json::to_value(chunk.ext_kind) {
        payload.insert("ext_kind".to_string(), ext_kind);
    }
    payload.insert("source".to_string(), serde_json::json!(chunk.source.as_str()));
    if let Some(class) = chunk.semantic_class {
        if let Ok(value) = serde_json::to_value(class) {
            payload.insert("semantic_class".to_string(), value);
        }
    }
    for (key, value) in &chunk.metadata {
        payload.entry(key.clone()).or_insert_with(|| value.clone());
    }
    payload
}

/// Reconstruct a chunk from a stored payload. Fields the payload lacks get
/// safe fallbacks; the chunk id is the point id.
pub fn chunk_from_payload(
    id: Uuid,
    payload: &BTreeMap<String, serde_json::Value>,
) -> ProviderResult<CodeChunk> {
    let text = payload
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let file_path = PathBuf::from(
        payload
            .get("file_path")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown"),
    );
    let line_start = payload
        .get("line_start")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1)
        .max(1) as usize;
    let line_end = payload
        .get("line_end")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(line_start as u64)
        .max(line_start as u64) as usize;

    let ext_kind = payload
        .get("ext_kind")
        .and_then(|v| serde_json::from_value::<ExtKind>(v.clone()).ok())
        .unwrap_or_else(|| ExtKind::from_path(&file_path));

    let span = Span::new(line_start, line_end, Uuid::now_v7())
        .map_err(|e| ProviderError::Other(format!("Stored span invalid: {e}")))?;

    let mut chunk = CodeChunk {
        chunk_id: id,
        content: text,
        line_range: span,
        file_path,
        language: ext_kind.language,
        ext_kind,
        source: match payload.get("source").and_then(|v| v.as_str()) {
            Some("semantic_ast") => ChunkSource::SemanticAst,
            Some("delimiter") => ChunkSource::Delimiter,
            Some("recursive") => ChunkSource::Recursive,
            _ => ChunkSource::TextBlock,
        },
        semantic_class: None,
        dense_embedding: None,
        sparse_embedding: None,
        metadata: BTreeMap::new(),
    };
    chunk.semantic_class = payload
        .get("semantic_class")
        .and_then(|v| serde_json::from_value::<SemanticClass>(v.clone()).ok());

    // Everything beyond the standard projection keys is caller metadata;
    // restore it so round-tripped chunks keep it.
    const STANDARD_KEYS: [&str; 8] = [
        "text",
        "file_path",
        "language",
        "line_start",
        "line_end",
        "ext_kind",
        "source",
        "semantic_class",
    ];
    for (key, value) in payload {
        if !STANDARD_KEYS.contains(&key.as_str()) {
            chunk.metadata.insert(key.clone(), value.clone());
        }
    }
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_chunking::Span;

    fn chunk() -> CodeChunk {
        let span = Span::new(3, 9, Uuid::now_v7()).unwrap();
        let mut chunk = CodeChunk::new(
            "fn demo() {}",
            span,
            "src/demo.rs",
            ExtKind::from_extension("rs"),
            ChunkSource::SemanticAst,
        );
        chunk.semantic_class = Some(SemanticClass::DefinitionCallable);
        chunk
    }

    #[test]
    fn test_payload_projection() {
        let chunk = chunk();
        let payload = chunk_payload(&chunk);
        assert_eq!(payload["text"], serde_json::json!("fn demo() {}"));
        assert_eq!(payload["file_path"], serde_json::json!("src/demo.rs"));
        assert_eq!(payload["language"], serde_json::json!("rust"));
        assert_eq!(payload["line_start"], serde_json::json!(3));
        assert_eq!(payload["line_end"], serde_json::json!(9));
        assert_eq!(payload["source"], serde_json::json!("semantic_ast"));
        assert!(payload.contains_key("semantic_class"));
    }

    #[test]
    fn test_payload_roundtrip() {
        let original = chunk();
        let payload = chunk_payload(&original);
        let rebuilt = chunk_from_payload(original.chunk_id, &payload).unwrap();
        assert_eq!(rebuilt.chunk_id, original.chunk_id);
        assert_eq!(rebuilt.content, original.content);
        assert_eq!(rebuilt.file_path, original.file_path);
        assert_eq!(rebuilt.line_range.start_line, 3);
        assert_eq!(rebuilt.line_range.end_line, 9);
        assert_eq!(rebuilt.language, original.language);
        assert_eq!(rebuilt.semantic_class, original.semantic_class);
        assert_eq!(rebuilt.source, original.source);
    }

    #[test]
    fn test_stored_vectors_shapes() {
        let bare = StoredVectors::Bare(vec![0.1; 4]);
        assert!(bare.has_dense());
        assert!(!bare.has_sparse());

        let mut map = BTreeMap::new();
        map.insert(
            DENSE_VECTOR_NAME.to_string(),
            VectorData::Dense(vec![0.2; 4]),
        );
        map.insert(
            SPARSE_VECTOR_NAME.to_string(),
            VectorData::Sparse(SparseVec::new(vec![1, 2], vec![0.5, 0.5]).unwrap()),
        );
        let named = StoredVectors::Named(map);
        assert!(named.has_dense());
        assert!(named.has_sparse());
        assert_eq!(named.dense().map(Vec::len), Some(4));
        assert_eq!(named.sparse().map(SparseVec::len), Some(2));
    }

    #[test]
    fn test_sparse_only_named_map() {
        let mut map = BTreeMap::new();
        map.insert(
            SPARSE_VECTOR_NAME.to_string(),
            VectorData::Sparse(SparseVec::new(vec![7], vec![1.0]).unwrap()),
        );
        let vectors = StoredVectors::Named(map);
        assert!(!vectors.has_dense());
        assert!(vectors.has_sparse());
    }
}
