//! Qdrant vector store backend
//!
//! The networked storage backend. Dense vectors live under the default
//! (unnamed) slot, sparse vectors under the `sparse` named slot; payloads
//! follow the shared projection from [`crate::traits::chunk_payload`].
//!
//! Hybrid queries issue one search per slot and merge by point id, so the
//! pipeline's static dense/sparse weighting sees the raw per-slot scores
//! rather than a backend fusion.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CollectionExistsRequest, Condition, CreateCollection, DeletePoints, Distance, Filter,
    GetPoints, NamedVectors, PointId, PointStruct, PointVectors, PointsSelector, ScoredPoint,
    SearchPoints, SparseIndices, SparseVectorConfig, SparseVectorParams, UpsertPoints,
    UpdatePointVectors, Vector, VectorParams, VectorsOutput,
    points_selector::PointsSelectorOneOf, value::Kind, vectors_output::VectorsOptions,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use codeweaver_chunking::{CodeChunk, SearchResult, SparseVec};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    DENSE_VECTOR_NAME, MAX_SEARCH_CANDIDATES, QueryVector, SPARSE_VECTOR_NAME, SearchFilter,
    StoredPoint, StoredVectors, VectorData, VectorStoreProvider, chunk_from_payload, chunk_payload,
};

/// Qdrant-backed vector store.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
    dimensions: usize,
}

impl QdrantVectorStore {
    /// Connect and ensure the collection exists with dense + sparse slots.
    ///
    /// Reads `QDRANT_API_KEY` from the environment when set.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Backend` when the server is unreachable or
    /// collection creation fails.
    pub async fn new(
        url: &str,
        collection_name: impl Into<String>,
        dimensions: usize,
    ) -> ProviderResult<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Ok(api_key) = std::env::var("QDRANT_API_KEY") {
            builder = builder.api_key(api_key);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Backend(format!("Failed to create Qdrant client: {e}")))?;

        let store = Self {
            client,
            collection_name: collection_name.into(),
            dimensions,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn collection_exists(&self) -> ProviderResult<bool> {
        let request = CollectionExistsRequest {
            collection_name: self.collection_name.clone(),
        };
        self.client
            .collection_exists(request)
            .await
            .map_err(|e| ProviderError::Backend(format!("Failed to check collection exists: {e}")))
    }

    async fn ensure_collection(&self) -> ProviderResult<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let sparse_config = SparseVectorConfig {
            map: HashMap::from([(
                SPARSE_VECTOR_NAME.to_string(),
                SparseVectorParams::default(),
            )]),
        };

        let request = CreateCollection {
            collection_name: self.collection_name.clone(),
            vectors_config: Some(
                VectorParams {
                    size: self.dimensions as u64,
                    distance: Distance::Cosine as i32,
                    ..Default::default()
                }
                .into(),
            ),
            sparse_vectors_config: Some(sparse_config),
            ..Default::default()
        };

        match self.client.create_collection(request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Collection created by another process between the exists
                // check and this call is fine.
                let message = e.to_string();
                if message.contains("already exists") {
                    Ok(())
                } else {
                    Err(ProviderError::Backend(format!(
                        "Failed to create collection '{}': {e}",
                        self.collection_name
                    )))
                }
            }
        }
    }

    fn payload_to_qdrant(
        payload: &BTreeMap<String, serde_json::Value>,
    ) -> ProviderResult<Payload> {
        let as_value = serde_json::Value::Object(
            payload
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        Payload::try_from(as_value)
            .map_err(|e| ProviderError::Other(format!("Payload conversion failed: {e}")))
    }

    fn qdrant_value_to_json(value: &qdrant_client::qdrant::Value) -> serde_json::Value {
        match &value.kind {
            Some(Kind::BoolValue(b)) => serde_json::json!(b),
            Some(Kind::IntegerValue(i)) => serde_json::json!(i),
            Some(Kind::DoubleValue(d)) => serde_json::json!(d),
            Some(Kind::StringValue(s)) => serde_json::json!(s),
            Some(Kind::ListValue(list)) => serde_json::Value::Array(
                list.values.iter().map(Self::qdrant_value_to_json).collect(),
            ),
            Some(Kind::StructValue(map)) => serde_json::Value::Object(
                map.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::qdrant_value_to_json(v)))
                    .collect(),
            ),
            Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        }
    }

    fn payload_from_qdrant(
        payload: &HashMap<String, qdrant_client::qdrant::Value>,
    ) -> BTreeMap<String, serde_json::Value> {
        payload
            .iter()
            .map(|(k, v)| (k.clone(), Self::qdrant_value_to_json(v)))
            .collect()
    }

    fn point_id_to_uuid(id: Option<&PointId>) -> Option<Uuid> {
        use qdrant_client::qdrant::point_id::PointIdOptions;
        match id.and_then(|id| id.point_id_options.as_ref()) {
            Some(PointIdOptions::Uuid(text)) => Uuid::parse_str(text).ok(),
            _ => None,
        }
    }

    fn chunk_vectors(chunk: &CodeChunk) -> Option<NamedVectors> {
        let mut vectors = NamedVectors::default();
        let mut any = false;
        if let Some(dense) = &chunk.dense_embedding {
            vectors = vectors.add_vector(DENSE_VECTOR_NAME, Vector::new_dense(dense.clone()));
            any = true;
        }
        if let Some(sparse) = &chunk.sparse_embedding {
            vectors = vectors.add_vector(
                SPARSE_VECTOR_NAME,
                Vector::new_sparse(sparse.indices().to_vec(), sparse.values().to_vec()),
            );
            any = true;
        }
        any.then_some(vectors)
    }

    fn vector_data_to_qdrant(data: &VectorData) -> Vector {
        match data {
            VectorData::Dense(dense) => Vector::new_dense(dense.clone()),
            VectorData::Sparse(sparse) => {
                Vector::new_sparse(sparse.indices().to_vec(), sparse.values().to_vec())
            }
        }
    }

    fn stored_vectors_from_output(vectors: Option<&VectorsOutput>) -> StoredVectors {
        let Some(options) = vectors.and_then(|v| v.vectors_options.as_ref()) else {
            return StoredVectors::Named(BTreeMap::new());
        };
        match options {
            VectorsOptions::Vector(vector) => {
                // Bare form: a single dense vector under the default slot.
                StoredVectors::Bare(vector.data.clone())
            }
            VectorsOptions::Vectors(named) => {
                let mut map = BTreeMap::new();
                for (name, vector) in &named.vectors {
                    let data = match &vector.indices {
                        Some(indices) => SparseVec::new(indices.data.clone(), vector.data.clone())
                            .map(VectorData::Sparse)
                            .unwrap_or_else(|_| VectorData::Dense(vector.data.clone())),
                        None => VectorData::Dense(vector.data.clone()),
                    };
                    map.insert(name.clone(), data);
                }
                StoredVectors::Named(map)
            }
        }
    }

    async fn search_slot(
        &self,
        vector: Vec<f32>,
        sparse_indices: Option<Vec<u32>>,
        vector_name: Option<String>,
    ) -> ProviderResult<Vec<ScoredPoint>> {
        let request = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector,
            sparse_indices: sparse_indices.map(|data| SparseIndices { data }),
            vector_name,
            limit: MAX_SEARCH_CANDIDATES as u64,
            with_payload: Some(true.into()),
            ..Default::default()
        };
        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| ProviderError::Backend(format!("Search failed: {e}")))?;
        Ok(response.result)
    }

    fn scored_point_to_result(point: &ScoredPoint) -> ProviderResult<SearchResult> {
        let id = Self::point_id_to_uuid(point.id.as_ref())
            .ok_or_else(|| ProviderError::Backend("Point id is not a UUID".to_string()))?;
        let payload = Self::payload_from_qdrant(&point.payload);
        let chunk = chunk_from_payload(id, &payload)?;
        Ok(SearchResult::new(chunk, point.score))
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantVectorStore {
    #[tracing::instrument(skip(self, chunks), fields(chunk_count = chunks.len(), collection = %self.collection_name))]
    async fn upsert(&self, chunks: &[CodeChunk]) -> ProviderResult<usize> {
        let mut points = Vec::new();
        for chunk in chunks {
            let Some(vectors) = Self::chunk_vectors(chunk) else {
                continue;
            };
            let payload = Self::payload_to_qdrant(&chunk_payload(chunk))?;
            points.push(PointStruct::new(
                chunk.chunk_id.to_string(),
                vectors,
                payload,
            ));
        }

        if points.is_empty() {
            return Ok(0);
        }
        let written = points.len();

        let request = UpsertPoints {
            collection_name: self.collection_name.clone(),
            points,
            ..Default::default()
        };
        self.client
            .upsert_points(request)
            .await
            .map_err(|e| ProviderError::Backend(format!("Failed to upsert chunks: {e}")))?;

        Ok(written)
    }

    async fn delete_by_file(&self, path: &Path) -> ProviderResult<usize> {
        let filter = Filter::must([Condition::matches(
            "file_path",
            path.to_string_lossy().into_owned(),
        )]);
        let request = DeletePoints {
            collection_name: self.collection_name.clone(),
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Filter(filter)),
            }),
            ..Default::default()
        };
        self.client
            .delete_points(request)
            .await
            .map_err(|e| ProviderError::Backend(format!("Failed to delete by file: {e}")))?;
        // Qdrant's delete response does not carry a removed count.
        Ok(0)
    }

    #[tracing::instrument(skip(self, vector), fields(collection = %self.collection_name))]
    async fn search(
        &self,
        vector: QueryVector,
        _filter: Option<SearchFilter>,
    ) -> ProviderResult<Vec<SearchResult>> {
        match vector {
            QueryVector::Dense(dense) => {
                let scored = self.search_slot(dense, None, None).await?;
                scored.iter().map(Self::scored_point_to_result).collect()
            }
            QueryVector::Sparse(sparse) => {
                let scored = self
                    .search_slot(
                        sparse.values().to_vec(),
                        Some(sparse.indices().to_vec()),
                        Some(SPARSE_VECTOR_NAME.to_string()),
                    )
                    .await?;
                let mut results: Vec<SearchResult> = scored
                    .iter()
                    .map(Self::scored_point_to_result)
                    .collect::<ProviderResult<_>>()?;
                for result in &mut results {
                    result.sparse_score = Some(result.score);
                }
                Ok(results)
            }
            QueryVector::Hybrid { dense, sparse } => {
                // One search per slot, merged by point id.
                let dense_hits = self.search_slot(dense, None, None).await?;
                let sparse_hits = self
                    .search_slot(
                        sparse.values().to_vec(),
                        Some(sparse.indices().to_vec()),
                        Some(SPARSE_VECTOR_NAME.to_string()),
                    )
                    .await?;

                let mut merged: HashMap<Uuid, SearchResult> = HashMap::new();
                for point in &dense_hits {
                    let mut result = Self::scored_point_to_result(point)?;
                    result.dense_score = Some(point.score);
                    merged.insert(result.content.chunk_id, result);
                }
                for point in &sparse_hits {
                    let Some(id) = Self::point_id_to_uuid(point.id.as_ref()) else {
                        continue;
                    };
                    match merged.get_mut(&id) {
                        Some(existing) => existing.sparse_score = Some(point.score),
                        None => {
                            let mut result = Self::scored_point_to_result(point)?;
                            result.sparse_score = Some(point.score);
                            merged.insert(id, result);
                        }
                    }
                }

                Ok(merged
                    .into_values()
                    .take(MAX_SEARCH_CANDIDATES)
                    .collect())
            }
        }
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

        let points: Vec<PointVectors> = ids
            .iter()
            .zip(&vectors)
            .map(|(id, update)| {
                let mut named = NamedVectors::default();
                for (name, data) in update {
                    named = named.add_vector(name.as_str(), Self::vector_data_to_qdrant(data));
                }
                PointVectors {
                    id: Some(PointId::from(id.to_string())),
                    vectors: Some(named.into()),
                }
            })
            .collect();
        let count = points.len();

        let request = UpdatePointVectors {
            collection_name: self.collection_name.clone(),
            points,
            ..Default::default()
        };
        self.client
            .update_vectors(request)
            .await
            .map_err(|e| ProviderError::Backend(format!("Failed to update vectors: {e}")))?;

        Ok(count)
    }

    async fn retrieve(&self, ids: &[Uuid]) -> ProviderResult<Vec<StoredPoint>> {
        let request = GetPoints {
            collection_name: self.collection_name.clone(),
            ids: ids.iter().map(|id| PointId::from(id.to_string())).collect(),
            with_payload: Some(true.into()),
            with_vectors: Some(true.into()),
            ..Default::default()
        };
        let response = self
            .client
            .get_points(request)
            .await
            .map_err(|e| ProviderError::Backend(format!("Failed to retrieve points: {e}")))?;

        Ok(response
            .result
            .iter()
            .filter_map(|point| {
                let id = Self::point_id_to_uuid(point.id.as_ref())?;
                Some(StoredPoint {
                    id,
                    payload: Self::payload_from_qdrant(&point.payload),
                    vectors: Self::stored_vectors_from_output(point.vectors.as_ref()),
                })
            })
            .collect())
    }

    fn provider_name(&self) -> &str {
        "qdrant"
    }
}
