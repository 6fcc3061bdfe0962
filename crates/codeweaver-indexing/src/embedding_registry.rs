//! The embedding registry
//!
//! Single source of truth for per-chunk vectors between the embedding and
//! storage phases: chunks register after chunking, embedding batches write
//! vectors in by chunk id, and the storage phase fetches the updated chunks
//! back out before upsert. Writes go through the concurrent map's shard
//! locks; reads clone a snapshot.

use dashmap::DashMap;
use uuid::Uuid;

use codeweaver_chunking::{CodeChunk, SparseVec};

/// Chunk-id-keyed vector registry.
#[derive(Default)]
pub struct EmbeddingRegistry {
    chunks: DashMap<Uuid, CodeChunk>,
}

impl EmbeddingRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register chunks (ownership transfers in, keyed by chunk id).
    pub fn register(&self, chunks: Vec<CodeChunk>) {
        for chunk in chunks {
            self.chunks.insert(chunk.chunk_id, chunk);
        }
    }

    /// Attach a dense embedding to a registered chunk.
    pub fn set_dense(&self, chunk_id: Uuid, embedding: Vec<f32>) {
        if let Some(mut chunk) = self.chunks.get_mut(&chunk_id) {
            chunk.dense_embedding = Some(embedding);
        }
    }

    /// Attach a sparse embedding to a registered chunk.
    pub fn set_sparse(&self, chunk_id: Uuid, embedding: SparseVec) {
        if let Some(mut chunk) = self.chunks.get_mut(&chunk_id) {
            chunk.sparse_embedding = Some(embedding);
        }
    }

    /// Snapshot the current state of the given chunks, in the given order.
    pub fn fetch(&self, ids: &[Uuid]) -> Vec<CodeChunk> {
        ids.iter()
            .filter_map(|id| self.chunks.get(id).map(|c| c.clone()))
            .collect()
    }

    /// Remove chunks after they are safely stored.
    pub fn release(&self, ids: &[Uuid]) {
        for id in ids {
            self.chunks.remove(id);
        }
    }

    /// Number of registered chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
