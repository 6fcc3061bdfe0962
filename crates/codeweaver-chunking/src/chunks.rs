//! Code chunks and search results
//!
//! A [`CodeChunk`] is a contiguous fragment of source text with its span,
//! language, classification, and optional embeddings. Chunks are owned by
//! exactly one file; within a file they are totally ordered by span start.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use codeweaver_grammar::{ExtKind, SemanticClass, SemanticSearchLanguage};

use crate::error::{ChunkingError, ChunkingResult};
use crate::spans::Span;

/// Which strategy produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSource {
    /// Tree-sitter AST walk
    SemanticAst,
    /// Delimiter rules (user-registered or builtin)
    Delimiter,
    /// Recursive character splitter
    Recursive,
    /// Whole-text block (markdown sections, unparseable files)
    TextBlock,
}

impl ChunkSource {
    /// Stable payload string for persisted chunks.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SemanticAst => "semantic_ast",
            Self::Delimiter => "delimiter",
            Self::Recursive => "recursive",
            Self::TextBlock => "text_block",
        }
    }
}

/// A sparse embedding: parallel index/value arrays with strictly increasing
/// indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVec {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVec {
    /// Build a validated sparse vector.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::InvalidSparseVector`] when the arrays differ
    /// in length or the indices are not strictly increasing.
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> ChunkingResult<Self> {
        if indices.len() != values.len() {
            return Err(ChunkingError::InvalidSparseVector(format!(
                "{} indices vs {} values",
                indices.len(),
                values.len()
            )));
        }
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ChunkingError::InvalidSparseVector(
                "indices must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { indices, values })
    }

    /// An empty sparse vector.
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// The index array.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The value array.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the vector has no entries.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sparse dot product. Both index arrays are sorted, so this is a
    /// single merge pass.
    pub fn dot(&self, other: &Self) -> f32 {
        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// A contiguous fragment of source text with attached metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Time-ordered chunk identifier
    pub chunk_id: Uuid,
    /// The chunk text
    pub content: String,
    /// Inclusive line range within the owning file
    pub line_range: Span,
    /// Owning file path
    pub file_path: PathBuf,
    /// Language, when the file resolves to one
    pub language: Option<SemanticSearchLanguage>,
    /// The file's `(language, category)` resolution
    pub ext_kind: ExtKind,
    /// Strategy that produced this chunk
    pub source: ChunkSource,
    /// Best-effort semantic classification; absent is a valid state
    pub semantic_class: Option<SemanticClass>,
    /// Dense embedding, filled by the embedding phase
    pub dense_embedding: Option<Vec<f32>>,
    /// Sparse embedding, filled by the embedding phase
    pub sparse_embedding: Option<SparseVec>,
    /// Free-form metadata carried into the vector store payload
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CodeChunk {
    /// Build a chunk with a fresh UUIDv7 id and no embeddings.
    pub fn new(
        content: impl Into<String>,
        line_range: Span,
        file_path: impl Into<PathBuf>,
        ext_kind: ExtKind,
        source: ChunkSource,
    ) -> Self {
        Self {
            chunk_id: Uuid::now_v7(),
            content: content.into(),
            line_range,
            file_path: file_path.into(),
            language: ext_kind.language,
            ext_kind,
            source,
            semantic_class: None,
            dense_embedding: None,
            sparse_embedding: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a semantic class.
    #[must_use]
    pub fn with_semantic_class(mut self, class: Option<SemanticClass>) -> Self {
        self.semantic_class = class;
        self
    }

    /// Whether the chunk has a dense embedding.
    pub fn has_dense(&self) -> bool {
        self.dense_embedding.is_some()
    }

    /// Whether the chunk has a sparse embedding.
    pub fn has_sparse(&self) -> bool {
        self.sparse_embedding.is_some()
    }

    /// Rough token estimate: `floor(1.3 * word_count)`.
    pub fn estimated_tokens(&self) -> usize {
        (self.content.split_whitespace().count() as f64 * 1.3) as usize
    }
}

/// A scored candidate coming back from the vector store.
///
/// Backends deliver results unordered; the query pipeline sorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched chunk
    pub content: CodeChunk,
    /// Combined score (backend similarity, later overwritten by the hybrid
    /// weight combination)
    pub score: f32,
    /// Dense-slot similarity when the backend reports it
    pub dense_score: Option<f32>,
    /// Sparse-slot similarity when the backend reports it
    pub sparse_score: Option<f32>,
    /// Reranker score, when a reranking pass ran
    pub rerank_score: Option<f32>,
    /// Final semantic-weighted score
    pub relevance_score: Option<f32>,
    /// Owning file path, duplicated out of the chunk for filter passes
    pub file_path: PathBuf,
}

impl SearchResult {
    /// Wrap a chunk with its backend score.
    pub fn new(content: CodeChunk, score: f32) -> Self {
        let file_path = content.file_path.clone();
        Self {
            content,
            score,
            dense_score: None,
            sparse_score: None,
            rerank_score: None,
            relevance_score: None,
            file_path,
        }
    }

    /// The score the final sort should use.
    pub fn effective_score(&self) -> f32 {
        self.relevance_score.unwrap_or(self.score)
    }
}
