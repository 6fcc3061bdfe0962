//! Provider registry
//!
//! Binds abstract [`ProviderKind`] tags to concrete backends through a
//! factory table, instantiates lazily, and caches singleton instances
//! bound to the loaded configuration.
//!
//! Built-in backends register as dedicated factory variants (the
//! deployment-scoped store connectors get their own variants rather than
//! sentinel strings), so construction paths are explicit in the type.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use codeweaver_config::{CodeWeaverConfig, ProviderEntry};

use crate::backends::memory::InMemoryVectorStore;
use crate::backends::mock::{MockEmbedding, MockReranker, MockSparseEmbedding};
use crate::error::{ProviderError, ProviderResult};
use crate::kinds::{ProviderId, ProviderKind};
use crate::traits::{
    EmbeddingProvider, RerankingProvider, SparseEmbeddingProvider, VectorStoreProvider,
};

/// Context handed to factories at instantiation time.
pub struct FactoryContext<'a> {
    /// The loaded configuration
    pub config: &'a CodeWeaverConfig,
    /// The user's provider entry for this kind, when one is configured
    pub entry: Option<&'a ProviderEntry>,
}

impl FactoryContext<'_> {
    fn option_u64(&self, key: &str) -> Option<u64> {
        self.entry
            .and_then(|e| e.options.get(key))
            .and_then(serde_json::Value::as_u64)
    }

    fn option_bool(&self, key: &str) -> Option<bool> {
        self.entry
            .and_then(|e| e.options.get(key))
            .and_then(serde_json::Value::as_bool)
    }

    fn option_string(&self, key: &str) -> Option<String> {
        self.entry
            .and_then(|e| e.options.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Synchronous custom factory functions.
pub type EmbeddingFactoryFn = fn(&FactoryContext<'_>) -> ProviderResult<Arc<dyn EmbeddingProvider>>;
pub type SparseFactoryFn =
    fn(&FactoryContext<'_>) -> ProviderResult<Arc<dyn SparseEmbeddingProvider>>;
pub type RerankFactoryFn = fn(&FactoryContext<'_>) -> ProviderResult<Arc<dyn RerankingProvider>>;
pub type VectorStoreFactoryFn =
    fn(&FactoryContext<'_>) -> ProviderResult<Arc<dyn VectorStoreProvider>>;

/// A registered way to build a provider.
///
/// Built-in backends whose construction needs more than a plain call (the
/// networked store's async connect) are distinct variants; everything else
/// is a function pointer.
pub enum ProviderFactory {
    /// Custom or built-in dense embedder
    Embedding(EmbeddingFactoryFn),
    /// Custom or built-in sparse embedder
    SparseEmbedding(SparseFactoryFn),
    /// Custom or built-in reranker
    Reranking(RerankFactoryFn),
    /// Custom synchronous vector store
    VectorStore(VectorStoreFactoryFn),
    /// Built-in in-memory store (options-driven persistence)
    MemoryVectorStore,
    /// Built-in Qdrant store (async connect from the vector-store config)
    #[cfg(feature = "qdrant")]
    QdrantVectorStore,
}

/// A cached provider instance.
#[derive(Clone)]
pub enum ProviderInstance {
    Embedding(Arc<dyn EmbeddingProvider>),
    SparseEmbedding(Arc<dyn SparseEmbeddingProvider>),
    Reranking(Arc<dyn RerankingProvider>),
    VectorStore(Arc<dyn VectorStoreProvider>),
}

type FactoryKey = (ProviderKind, ProviderId);

/// The provider registry.
pub struct ProviderRegistry {
    config: CodeWeaverConfig,
    factories: RwLock<HashMap<FactoryKey, ProviderFactory>>,
    instances: DashMap<FactoryKey, ProviderInstance>,
}

fn mock_embedding_factory(ctx: &FactoryContext<'_>) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
    let dimensions = ctx
        .option_u64("dimensions")
        .map(|d| d as usize)
        .unwrap_or(ctx.config.vector_store.dimensions);
    Ok(Arc::new(MockEmbedding::new(dimensions)))
}

fn mock_sparse_factory(
    ctx: &FactoryContext<'_>,
) -> ProviderResult<Arc<dyn SparseEmbeddingProvider>> {
    let vocabulary = ctx.option_u64("vocabulary_size").unwrap_or(30_000) as u32;
    Ok(Arc::new(MockSparseEmbedding::new(vocabulary)))
}

fn mock_reranker_factory(_ctx: &FactoryContext<'_>) -> ProviderResult<Arc<dyn RerankingProvider>> {
    Ok(Arc::new(MockReranker::new()))
}

impl ProviderRegistry {
    /// Registry bound to a configuration, with built-ins registered.
    pub fn new(config: CodeWeaverConfig) -> Self {
        let registry = Self {
            config,
            factories: RwLock::new(HashMap::new()),
            instances: DashMap::new(),
        };
        registry.register_builtin_providers();
        registry
    }

    /// The configuration this registry serves.
    pub fn config(&self) -> &CodeWeaverConfig {
        &self.config
    }

    fn register_builtin_providers(&self) {
        self.register(
            ProviderKind::Embedding,
            ProviderId::MockEmbedding,
            ProviderFactory::Embedding(mock_embedding_factory),
        );
        self.register(
            ProviderKind::SparseEmbedding,
            ProviderId::MockSparseEmbedding,
            ProviderFactory::SparseEmbedding(mock_sparse_factory),
        );
        self.register(
            ProviderKind::Reranking,
            ProviderId::MockReranker,
            ProviderFactory::Reranking(mock_reranker_factory),
        );
        self.register(
            ProviderKind::VectorStore,
            ProviderId::Memory,
            ProviderFactory::MemoryVectorStore,
        );
        #[cfg(feature = "qdrant")]
        self.register(
            ProviderKind::VectorStore,
            ProviderId::Qdrant,
            ProviderFactory::QdrantVectorStore,
        );
    }

    /// Store a lazy factory for a (kind, id) pair.
    pub fn register(&self, kind: ProviderKind, id: ProviderId, factory: ProviderFactory) {
        if let Ok(mut factories) = self.factories.write() {
            factories.insert((kind, id), factory);
        }
    }

    /// The configured default provider id for a kind, or `None`.
    pub fn get_provider_enum_for(&self, kind: ProviderKind) -> Option<ProviderId> {
        self.config
            .providers
            .enabled_entry(kind.name())
            .map(|entry| ProviderId::parse(&entry.provider))
    }

    /// Registered provider ids for a kind.
    pub fn list_providers(&self, kind: ProviderKind) -> Vec<ProviderId> {
        self.factories
            .read()
            .map(|factories| {
                let mut ids: Vec<ProviderId> = factories
                    .keys()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, id)| id.clone())
                    .collect();
                ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                ids
            })
            .unwrap_or_default()
    }

    /// Whether a backend can be instantiated. Unavailable backends answer
    /// `false`; discovery never raises.
    pub fn is_provider_available(&self, id: &ProviderId, kind: ProviderKind) -> bool {
        self.factories
            .read()
            .map(|factories| factories.contains_key(&(kind, id.clone())))
            .unwrap_or(false)
    }

    /// Drop all cached singleton instances.
    pub fn clear_instances(&self) {
        self.instances.clear();
    }

    fn entry_for(&self, kind: ProviderKind) -> Option<&ProviderEntry> {
        self.config.providers.enabled_entry(kind.name())
    }

    fn not_registered(kind: ProviderKind, id: &ProviderId) -> ProviderError {
        ProviderError::NotRegistered {
            kind: kind.to_string(),
            provider: id.to_string(),
        }
    }

    async fn create_instance(
        &self,
        kind: ProviderKind,
        id: &ProviderId,
    ) -> ProviderResult<ProviderInstance> {
        // The factory variant is resolved under the lock; construction runs
        // outside it so async connects don't hold the table.
        enum Plan {
            Embedding(EmbeddingFactoryFn),
            Sparse(SparseFactoryFn),
            Rerank(RerankFactoryFn),
            VectorStore(VectorStoreFactoryFn),
            Memory,
            #[cfg(feature = "qdrant")]
            Qdrant,
        }

        let plan = {
            let factories = self
                .factories
                .read()
                .map_err(|_| ProviderError::Other("factory table lock poisoned".to_string()))?;
            match factories.get(&(kind, id.clone())) {
                Some(ProviderFactory::Embedding(f)) => Plan::Embedding(*f),
                Some(ProviderFactory::SparseEmbedding(f)) => Plan::Sparse(*f),
                Some(ProviderFactory::Reranking(f)) => Plan::Rerank(*f),
                Some(ProviderFactory::VectorStore(f)) => Plan::VectorStore(*f),
                Some(ProviderFactory::MemoryVectorStore) => Plan::Memory,
                #[cfg(feature = "qdrant")]
                Some(ProviderFactory::QdrantVectorStore) => Plan::Qdrant,
                None => return Err(Self::not_registered(kind, id)),
            }
        };

        let ctx = FactoryContext {
            config: &self.config,
            entry: self.entry_for(kind),
        };

        let instance = match plan {
            Plan::Embedding(f) => ProviderInstance::Embedding(
                f(&ctx).map_err(|e| ProviderError::Configuration(e.to_string()))?,
            ),
            Plan::Sparse(f) => ProviderInstance::SparseEmbedding(
                f(&ctx).map_err(|e| ProviderError::Configuration(e.to_string()))?,
            ),
            Plan::Rerank(f) => ProviderInstance::Reranking(
                f(&ctx).map_err(|e| ProviderError::Configuration(e.to_string()))?,
            ),
            Plan::VectorStore(f) => ProviderInstance::VectorStore(
                f(&ctx).map_err(|e| ProviderError::Configuration(e.to_string()))?,
            ),
            Plan::Memory => {
                let store = match ctx.option_string("persist_path") {
                    Some(path) => InMemoryVectorStore::with_persistence(
                        PathBuf::from(path),
                        ctx.option_bool("auto_persist").unwrap_or(false),
                    )
                    .map_err(|e| ProviderError::Configuration(e.to_string()))?,
                    None => InMemoryVectorStore::new(),
                };
                ProviderInstance::VectorStore(Arc::new(store))
            }
            #[cfg(feature = "qdrant")]
            Plan::Qdrant => {
                let store = crate::backends::qdrant::QdrantVectorStore::new(
                    &self.config.vector_store.url,
                    self.config.vector_store.collection.clone(),
                    self.config.vector_store.dimensions,
                )
                .await
                .map_err(|e| ProviderError::Configuration(e.to_string()))?;
                ProviderInstance::VectorStore(Arc::new(store))
            }
        };

        Ok(instance)
    }

    async fn get_instance(
        &self,
        kind: ProviderKind,
        id: &ProviderId,
        singleton: bool,
    ) -> ProviderResult<ProviderInstance> {
        if singleton {
            if let Some(cached) = self.instances.get(&(kind, id.clone())) {
                return Ok(cached.clone());
            }
        }
        let instance = self.create_instance(kind, id).await?;
        if singleton {
            self.instances
                .insert((kind, id.clone()), instance.clone());
        }
        Ok(instance)
    }

    /// Instantiate a dense embedding provider.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when the backend is not registered or fails to
    /// construct.
    pub async fn create_embedding_provider(
        &self,
        id: &ProviderId,
    ) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
        match self.create_instance(ProviderKind::Embedding, id).await? {
            ProviderInstance::Embedding(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::Embedding, id)),
        }
    }

    /// Instantiate a sparse embedding provider.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when the backend is not registered or fails to
    /// construct.
    pub async fn create_sparse_embedding_provider(
        &self,
        id: &ProviderId,
    ) -> ProviderResult<Arc<dyn SparseEmbeddingProvider>> {
        match self
            .create_instance(ProviderKind::SparseEmbedding, id)
            .await?
        {
            ProviderInstance::SparseEmbedding(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::SparseEmbedding, id)),
        }
    }

    /// Instantiate a reranking provider.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when the backend is not registered or fails to
    /// construct.
    pub async fn create_reranking_provider(
        &self,
        id: &ProviderId,
    ) -> ProviderResult<Arc<dyn RerankingProvider>> {
        match self.create_instance(ProviderKind::Reranking, id).await? {
            ProviderInstance::Reranking(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::Reranking, id)),
        }
    }

    /// Instantiate a vector store provider.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when the backend is not registered or fails to
    /// construct.
    pub async fn create_vector_store_provider(
        &self,
        id: &ProviderId,
    ) -> ProviderResult<Arc<dyn VectorStoreProvider>> {
        match self.create_instance(ProviderKind::VectorStore, id).await? {
            ProviderInstance::VectorStore(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::VectorStore, id)),
        }
    }

    /// Get a dense embedding provider, optionally cached as a singleton.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::create_embedding_provider`].
    pub async fn get_embedding_provider_instance(
        &self,
        id: &ProviderId,
        singleton: bool,
    ) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
        match self
            .get_instance(ProviderKind::Embedding, id, singleton)
            .await?
        {
            ProviderInstance::Embedding(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::Embedding, id)),
        }
    }

    /// Get a sparse embedding provider, optionally cached as a singleton.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::create_sparse_embedding_provider`].
    pub async fn get_sparse_embedding_provider_instance(
        &self,
        id: &ProviderId,
        singleton: bool,
    ) -> ProviderResult<Arc<dyn SparseEmbeddingProvider>> {
        match self
            .get_instance(ProviderKind::SparseEmbedding, id, singleton)
            .await?
        {
            ProviderInstance::SparseEmbedding(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::SparseEmbedding, id)),
        }
    }

    /// Get a reranking provider, optionally cached as a singleton.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::create_reranking_provider`].
    pub async fn get_reranking_provider_instance(
        &self,
        id: &ProviderId,
        singleton: bool,
    ) -> ProviderResult<Arc<dyn RerankingProvider>> {
        match self
            .get_instance(ProviderKind::Reranking, id, singleton)
            .await?
        {
            ProviderInstance::Reranking(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::Reranking, id)),
        }
    }

    /// Get a vector store provider, optionally cached as a singleton.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::create_vector_store_provider`].
    pub async fn get_vector_store_provider_instance(
        &self,
        id: &ProviderId,
        singleton: bool,
    ) -> ProviderResult<Arc<dyn VectorStoreProvider>> {
        match self
            .get_instance(ProviderKind::VectorStore, id, singleton)
            .await?
        {
            ProviderInstance::VectorStore(provider) => Ok(provider),
            _ => Err(Self::not_registered(ProviderKind::VectorStore, id)),
        }
    }

    /// The default enabled dense embedding provider, if configured.
    ///
    /// # Errors
    ///
    /// Construction failures surface; an unconfigured kind is `Ok(None)`.
    pub async fn get_embedding_provider(
        &self,
    ) -> ProviderResult<Option<Arc<dyn EmbeddingProvider>>> {
        match self.get_provider_enum_for(ProviderKind::Embedding) {
            Some(id) => Ok(Some(
                self.get_embedding_provider_instance(&id, true).await?,
            )),
            None => Ok(None),
        }
    }

    /// The default enabled sparse embedding provider, if configured.
    ///
    /// # Errors
    ///
    /// Construction failures surface; an unconfigured kind is `Ok(None)`.
    pub async fn get_sparse_embedding_provider(
        &self,
    ) -> ProviderResult<Option<Arc<dyn SparseEmbeddingProvider>>> {
        match self.get_provider_enum_for(ProviderKind::SparseEmbedding) {
            Some(id) => Ok(Some(
                self.get_sparse_embedding_provider_instance(&id, true)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    /// The default enabled reranking provider, if configured.
    ///
    /// # Errors
    ///
    /// Construction failures surface; an unconfigured kind is `Ok(None)`.
    pub async fn get_reranking_provider(
        &self,
    ) -> ProviderResult<Option<Arc<dyn RerankingProvider>>> {
        match self.get_provider_enum_for(ProviderKind::Reranking) {
            Some(id) => Ok(Some(
                self.get_reranking_provider_instance(&id, true).await?,
            )),
            None => Ok(None),
        }
    }

    /// The default enabled vector store, if configured.
    ///
    /// # Errors
    ///
    /// Construction failures surface; an unconfigured kind is `Ok(None)`.
    pub async fn get_vector_store_provider(
        &self,
    ) -> ProviderResult<Option<Arc<dyn VectorStoreProvider>>> {
        match self.get_provider_enum_for(ProviderKind::VectorStore) {
            Some(id) => Ok(Some(
                self.get_vector_store_provider_instance(&id, true).await?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_config::ProviderSelectionConfig;

    fn config_with(providers: ProviderSelectionConfig) -> CodeWeaverConfig {
        CodeWeaverConfig {
            providers,
            ..CodeWeaverConfig::default()
        }
    }

    fn full_mock_config() -> CodeWeaverConfig {
        config_with(ProviderSelectionConfig {
            embedding: Some(ProviderEntry::with_model("mock-embedding", "mock-dense-768")),
            sparse_embedding: Some(ProviderEntry::with_model(
                "mock-sparse-embedding",
                "mock-sparse-bow",
            )),
            reranking: Some(ProviderEntry::new("mock-reranker")),
            vector_store: Some(ProviderEntry::new("memory")),
        })
    }

    #[tokio::test]
    async fn test_builtins_are_listed() {
        let registry = ProviderRegistry::new(CodeWeaverConfig::default());
        let stores = registry.list_providers(ProviderKind::VectorStore);
        assert!(stores.contains(&ProviderId::Memory));
        assert!(
            registry.is_provider_available(&ProviderId::MockEmbedding, ProviderKind::Embedding)
        );
        assert!(
            !registry.is_provider_available(
                &ProviderId::Custom("voyage".to_string()),
                ProviderKind::Embedding
            )
        );
    }

    #[tokio::test]
    async fn test_unconfigured_kind_has_no_default() {
        let registry = ProviderRegistry::new(CodeWeaverConfig::default());
        assert!(registry.get_provider_enum_for(ProviderKind::Embedding).is_none());
        assert!(registry.get_embedding_provider().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_configured_default_resolves() {
        let registry = ProviderRegistry::new(full_mock_config());
        assert_eq!(
            registry.get_provider_enum_for(ProviderKind::Embedding),
            Some(ProviderId::MockEmbedding)
        );
        let provider = registry.get_embedding_provider().await.unwrap().unwrap();
        assert_eq!(provider.provider_name(), "mock-embedding");
    }

    #[tokio::test]
    async fn test_unregistered_provider_fails_with_configuration_error() {
        let registry = ProviderRegistry::new(CodeWeaverConfig::default());
        let result = registry
            .create_embedding_provider(&ProviderId::Custom("voyage".to_string()))
            .await;
        assert!(matches!(
            result,
            Err(ProviderError::NotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_singleton_instances_are_cached() {
        let registry = ProviderRegistry::new(full_mock_config());
        let a = registry
            .get_vector_store_provider_instance(&ProviderId::Memory, true)
            .await
            .unwrap();
        let b = registry
            .get_vector_store_provider_instance(&ProviderId::Memory, true)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.clear_instances();
        let c = registry
            .get_vector_store_provider_instance(&ProviderId::Memory, true)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_non_singleton_instances_are_fresh() {
        let registry = ProviderRegistry::new(full_mock_config());
        let a = registry
            .get_vector_store_provider_instance(&ProviderId::Memory, false)
            .await
            .unwrap();
        let b = registry
            .get_vector_store_provider_instance(&ProviderId::Memory, false)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_custom_registration() {
        fn custom_embedding(
            _ctx: &FactoryContext<'_>,
        ) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
            Ok(Arc::new(MockEmbedding::new(16)))
        }

        let registry = ProviderRegistry::new(CodeWeaverConfig::default());
        let id = ProviderId::Custom("tiny".to_string());
        registry.register(
            ProviderKind::Embedding,
            id.clone(),
            ProviderFactory::Embedding(custom_embedding),
        );
        assert!(registry.is_provider_available(&id, ProviderKind::Embedding));

        let provider = registry.create_embedding_provider(&id).await.unwrap();
        assert_eq!(provider.embedding_dimension(), 16);
    }

    #[tokio::test]
    async fn test_memory_store_persistence_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.json");

        let mut entry = ProviderEntry::new("memory");
        entry.options.insert(
            "persist_path".to_string(),
            serde_json::json!(path.to_string_lossy()),
        );
        entry
            .options
            .insert("auto_persist".to_string(), serde_json::json!(true));

        let config = config_with(ProviderSelectionConfig {
            vector_store: Some(entry),
            ..ProviderSelectionConfig::default()
        });
        let registry = ProviderRegistry::new(config);
        let store = registry.get_vector_store_provider().await.unwrap().unwrap();
        assert_eq!(store.provider_name(), "memory");
    }
}
