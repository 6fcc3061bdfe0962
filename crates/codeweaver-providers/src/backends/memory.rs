//! In-memory vector store
//!
//! The always-available backend: points live in a process-local map, with
//! an optional JSON snapshot on disk (`auto_persist` + `persist_path`) so a
//! re-instantiated provider sees the same points. Used by tests, offline
//! development, and as the reference implementation of the store contract.
//!
//! Scores are cosine similarity per slot (provider-specific bounds
//! `[-1, 1]`; non-degenerate embeddings land in `[0, 1]`). Results are
//! intentionally returned unordered - sorting candidates is the query
//! pipeline's job.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use codeweaver_chunking::{CodeChunk, SearchResult, SparseVec};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    DENSE_VECTOR_NAME, MAX_SEARCH_CANDIDATES, QueryVector, SPARSE_VECTOR_NAME, SearchFilter,
    StoredPoint, StoredVectors, VectorData, VectorStoreProvider, chunk_from_payload, chunk_payload,
};

type PointMap = Arc<RwLock<HashMap<Uuid, StoredPoint>>>;

/// In-memory vector store with optional JSON persistence.
pub struct InMemoryVectorStore {
    points: PointMap,
    auto_persist: bool,
    persist_path: Option<PathBuf>,
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

fn sparse_cosine(a: &SparseVec, b: &SparseVec) -> Option<f32> {
    let dot = a.dot(b);
    let norm_a: f32 = a.values().iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

impl InMemoryVectorStore {
    /// Volatile store.
    pub fn new() -> Self {
        Self {
            points: Arc::new(RwLock::new(HashMap::new())),
            auto_persist: false,
            persist_path: None,
        }
    }

    /// Store with a snapshot path. An existing snapshot is loaded; with
    /// `auto_persist` every mutation rewrites it.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing snapshot fails to parse.
    pub fn with_persistence(path: impl Into<PathBuf>, auto_persist: bool) -> ProviderResult<Self> {
        let path = path.into();
        let mut points = HashMap::new();
        if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            let loaded: Vec<StoredPoint> = serde_json::from_str(&content)?;
            points = loaded.into_iter().map(|p| (p.id, p)).collect();
        }
        Ok(Self {
            points: Arc::new(RwLock::new(points)),
            auto_persist,
            persist_path: Some(path),
        })
    }

    /// Write the snapshot now (also called after mutations with
    /// `auto_persist`).
    ///
    /// # Errors
    ///
    /// Returns I/O or serialization errors; the write is atomic
    /// (temp + rename).
    pub fn persist(&self) -> ProviderResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let snapshot: Vec<StoredPoint> = {
            let points = self
                .points
                .read()
                .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;
            points.values().cloned().collect()
        };
        let json = serde_json::to_string(&snapshot)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn maybe_persist(&self) -> ProviderResult<()> {
        if self.auto_persist {
            self.persist()?;
        }
        Ok(())
    }

    /// Insert a fully formed point, bypassing chunk conversion. Lets tests
    /// set up exact stored-vector shapes (bare vs named).
    pub fn insert_point(&self, point: StoredPoint) -> ProviderResult<()> {
        {
            let mut points = self
                .points
                .write()
                .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;
            points.insert(point.id, point);
        }
        self.maybe_persist()
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a point id is present (test assertions).
    pub fn contains(&self, id: &Uuid) -> bool {
        self.points
            .read()
            .map(|p| p.contains_key(id))
            .unwrap_or(false)
    }

    fn stored_vectors_for(chunk: &CodeChunk) -> Option<StoredVectors> {
        match (&chunk.dense_embedding, &chunk.sparse_embedding) {
            (Some(dense), Some(sparse)) => {
                let mut map = BTreeMap::new();
                map.insert(
                    DENSE_VECTOR_NAME.to_string(),
                    VectorData::Dense(dense.clone()),
                );
                map.insert(
                    SPARSE_VECTOR_NAME.to_string(),
                    VectorData::Sparse(sparse.clone()),
                );
                Some(StoredVectors::Named(map))
            }
            (Some(dense), None) => Some(StoredVectors::Bare(dense.clone())),
            (None, Some(sparse)) => {
                let mut map = BTreeMap::new();
                map.insert(
                    SPARSE_VECTOR_NAME.to_string(),
                    VectorData::Sparse(sparse.clone()),
                );
                Some(StoredVectors::Named(map))
            }
            (None, None) => None,
        }
    }

    fn passes_filter(payload: &BTreeMap<String, serde_json::Value>, filter: &SearchFilter) -> bool {
        if let Some(language) = filter.language {
            let matches = payload
                .get("language")
                .and_then(|v| v.as_str())
                .is_some_and(|l| l == language.name());
            if !matches {
                return false;
            }
        }
        if let Some(needle) = &filter.path_contains {
            let matches = payload
                .get("file_path")
                .and_then(|v| v.as_str())
                .is_some_and(|p| p.contains(needle.as_str()));
            if !matches {
                return false;
            }
        }
        true
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[CodeChunk]) -> ProviderResult<usize> {
        let mut written = 0;
        {
            let mut points = self
                .points
                .write()
                .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;
            for chunk in chunks {
                let Some(vectors) = Self::stored_vectors_for(chunk) else {
                    continue;
                };
                points.insert(
                    chunk.chunk_id,
                    StoredPoint {
                        id: chunk.chunk_id,
                        payload: chunk_payload(chunk),
                        vectors,
                    },
                );
                written += 1;
            }
        }
        self.maybe_persist()?;
        Ok(written)
    }

    async fn delete_by_file(&self, path: &Path) -> ProviderResult<usize> {
        let target = path.to_string_lossy();
        let removed = {
            let mut points = self
                .points
                .write()
                .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;
            let before = points.len();
            points.retain(|_, point| {
                point
                    .payload
                    .get("file_path")
                    .and_then(|v| v.as_str())
                    .is_none_or(|p| p != target)
            });
            before - points.len()
        };
        self.maybe_persist()?;
        Ok(removed)
    }

    async fn search(
        &self,
        vector: QueryVector,
        filter: Option<SearchFilter>,
    ) -> ProviderResult<Vec<SearchResult>> {
        let points = self
            .points
            .read()
            .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;

        let mut results = Vec::new();
        for point in points.values() {
            if results.len() >= MAX_SEARCH_CANDIDATES {
                break;
            }
            if let Some(filter) = &filter {
                if !Self::passes_filter(&point.payload, filter) {
                    continue;
                }
            }

            let dense_score = match &vector {
                QueryVector::Dense(q) | QueryVector::Hybrid { dense: q, .. } => {
                    point.vectors.dense().and_then(|d| cosine(q, d))
                }
                QueryVector::Sparse(_) => None,
            };
            let sparse_score = match &vector {
                QueryVector::Sparse(q) | QueryVector::Hybrid { sparse: q, .. } => {
                    point.vectors.sparse().and_then(|s| sparse_cosine(q, s))
                }
                QueryVector::Dense(_) => None,
            };

            let score = match (&vector, dense_score, sparse_score) {
                (QueryVector::Dense(_), Some(d), _) => d,
                (QueryVector::Sparse(_), _, Some(s)) => s,
                (QueryVector::Hybrid { .. }, Some(d), _) => d,
                (QueryVector::Hybrid { .. }, None, Some(s)) => s,
                _ => continue, // point has none of the requested slots
            };

            let chunk = chunk_from_payload(point.id, &point.payload)?;
            let mut result = SearchResult::new(chunk, score);
            result.dense_score = dense_score;
            result.sparse_score = sparse_score;
            results.push(result);
        }

        // No sort here: callers must order candidates themselves.
        Ok(results)
    }

    async fn update_vectors(
        &self,
        ids: &[Uuid],
        vectors: Vec<BTreeMap<String, VectorData>>,
    ) -> ProviderResult<usize> {
        if ids.len() != vectors.len() {
            return Err(ProviderError::VectorShape(format!(
                "{} ids vs {} vector maps",
                ids.len(),
                vectors.len()
            )));
        }

        let mut updated = 0;
        {
            let mut points = self
                .points
                .write()
                .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;
            for (id, update) in ids.iter().zip(vectors) {
                let Some(point) = points.get_mut(id) else {
                    continue;
                };
                // Normalize to the named form, then merge the update's slots.
                let mut map = match &point.vectors {
                    StoredVectors::Bare(dense) => {
                        let mut map = BTreeMap::new();
                        map.insert(
                            DENSE_VECTOR_NAME.to_string(),
                            VectorData::Dense(dense.clone()),
                        );
                        map
                    }
                    StoredVectors::Named(map) => map.clone(),
                };
                for (name, data) in update {
                    map.insert(name, data);
                }
                point.vectors = StoredVectors::Named(map);
                updated += 1;
            }
        }
        self.maybe_persist()?;
        Ok(updated)
    }

    async fn retrieve(&self, ids: &[Uuid]) -> ProviderResult<Vec<StoredPoint>> {
        let points = self
            .points
            .read()
            .map_err(|_| ProviderError::Other("point map lock poisoned".to_string()))?;
        Ok(ids.iter().filter_map(|id| points.get(id).cloned()).collect())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
