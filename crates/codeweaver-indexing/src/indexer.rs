//! The indexer
//!
//! Orchestrates discover -> chunk -> embed -> upsert across cold starts,
//! incremental updates, and partial failures. Deletions are processed
//! before new/modified files in a pass, embedding calls are capped at the
//! configured batch size, the manifest is the incremental-filtering source
//! of truth, and checkpoints are saved on a file-count/time cadence plus
//! graceful shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use tokio::sync::Mutex;
use uuid::Uuid;

use codeweaver_chunking::{ChunkingService, CodeChunk, DiscoveredFile, SparseVec};
use codeweaver_common::{CorrelationId, Feature, error_excerpt};
use codeweaver_config::CodeWeaverConfig;
use codeweaver_providers::{
    EmbeddingProvider, ProviderRegistry, SPARSE_VECTOR_NAME, SparseEmbeddingProvider,
    StoredPoint, VectorData, VectorStoreProvider,
};

use crate::checkpoint::{CheckpointManager, IndexingCheckpoint};
use crate::embedding_registry::EmbeddingRegistry;
use crate::error::{IndexingError, IndexingResult};
use crate::manifest::{ChangeSet, FileManifestManager, IndexFileManifest};
use crate::retry::{retry_with_backoff, with_timeout};
use crate::stats::{IndexingPhase, IndexingStats, ProgressCallback};
use crate::walker::FileWalker;

/// Provider handles the indexer drives. Any of them may be absent; the
/// corresponding phase is skipped with a warning.
#[derive(Clone, Default)]
pub struct IndexerProviders {
    pub dense: Option<Arc<dyn EmbeddingProvider>>,
    pub sparse: Option<Arc<dyn SparseEmbeddingProvider>>,
    pub vector_store: Option<Arc<dyn VectorStoreProvider>>,
}

/// Outcome of one `prime_index` run.
#[derive(Debug, Clone, Default)]
pub struct IndexingReport {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_deleted: usize,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_indexed: usize,
    pub files_with_errors: Vec<PathBuf>,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub files_processed: usize,
    pub chunks_updated: usize,
    pub errors: Vec<String>,
}

/// The indexing engine for one project.
pub struct Indexer {
    project_path: PathBuf,
    config: CodeWeaverConfig,
    chunking: ChunkingService,
    providers: IndexerProviders,
    manifest: Mutex<IndexFileManifest>,
    manifest_manager: FileManifestManager,
    checkpoint_manager: CheckpointManager,
    embedding_registry: EmbeddingRegistry,
    stats: StdMutex<IndexingStats>,
    shutdown: Arc<AtomicBool>,
    signal_ids: StdMutex<Vec<signal_hook::SigId>>,
    progress: Option<ProgressCallback>,
    files_since_checkpoint: AtomicUsize,
    last_checkpoint_at: StdMutex<Instant>,
}

impl Indexer {
    /// Build an indexer from configuration, resolving providers through the
    /// registry. Missing providers degrade the corresponding phase rather
    /// than failing construction.
    ///
    /// # Errors
    ///
    /// Returns configuration errors only for an unusable project path.
    pub async fn from_config(
        project_path: impl Into<PathBuf>,
        config: CodeWeaverConfig,
    ) -> IndexingResult<Self> {
        let registry = ProviderRegistry::new(config.clone());

        let dense = match registry.get_embedding_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!("Dense embedding provider unavailable: {e}");
                None
            }
        };
        let sparse = match registry.get_sparse_embedding_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!("Sparse embedding provider unavailable: {e}");
                None
            }
        };
        let vector_store = match registry.get_vector_store_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!("Vector store unavailable: {e}");
                None
            }
        };

        Ok(Self::with_providers(
            project_path,
            config,
            IndexerProviders {
                dense,
                sparse,
                vector_store,
            },
        ))
    }

    /// Build an indexer with explicit provider handles (tests, embedding).
    pub fn with_providers(
        project_path: impl Into<PathBuf>,
        config: CodeWeaverConfig,
        providers: IndexerProviders,
    ) -> Self {
        let project_path = project_path.into();
        let cache_dir = config.indexing.resolved_cache_dir();
        let manifest_manager = FileManifestManager::new(&cache_dir, &project_path);
        let manifest = manifest_manager
            .load()
            .unwrap_or_else(|| IndexFileManifest::new(&project_path));
        let checkpoint_manager =
            CheckpointManager::new(&cache_dir, config.indexing.checkpoint_max_age_secs);

        Self {
            chunking: ChunkingService::new(&config.chunker),
            manifest: Mutex::new(manifest),
            manifest_manager,
            checkpoint_manager,
            embedding_registry: EmbeddingRegistry::new(),
            stats: StdMutex::new(IndexingStats::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            signal_ids: StdMutex::new(Vec::new()),
            progress: None,
            files_since_checkpoint: AtomicUsize::new(0),
            last_checkpoint_at: StdMutex::new(Instant::now()),
            project_path,
            config,
            providers,
        }
    }

    /// Install a progress callback, invoked at phase boundaries.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The shared shutdown flag (set by signals or by the embedder).
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> IndexingStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn register_signal_handlers(&self) {
        let mut ids = match self.signal_ids.lock() {
            Ok(ids) => ids,
            Err(_) => return,
        };
        if !ids.is_empty() {
            return;
        }
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            match signal_hook::flag::register(signal, Arc::clone(&self.shutdown)) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!("Could not register signal handler: {e}"),
            }
        }
    }

    fn cleanup_signal_handlers(&self) {
        if let Ok(mut ids) = self.signal_ids.lock() {
            for id in ids.drain(..) {
                signal_hook::low_level::unregister(id);
            }
        }
    }

    fn emit_progress(&self, phase: IndexingPhase) {
        if let Some(callback) = &self.progress {
            let snapshot = self.stats();
            callback(phase, &snapshot);
        }
    }

    fn record_file_error(&self, path: &Path, error: &dyn std::fmt::Display) {
        let message = error.to_string();
        let shown = error_excerpt(&message);
        tracing::error!(file = %path.display(), "File skipped: {shown}");
        if let Ok(mut stats) = self.stats.lock() {
            stats.files_with_errors.push(path.to_path_buf());
        }
    }

    /// The capability set this configuration advertises, with the
    /// dependency closure applied.
    ///
    /// Derived from which providers resolved: a vector store enables
    /// search, dense embeddings enable vector indexing/search, and both
    /// embedding kinds together enable hybrid search.
    pub fn advertised_features(&self) -> Feature {
        let mut features = Feature::FILE_DISCOVERY
            | Feature::FILE_FILTER
            | Feature::LOGGING
            | Feature::ERROR_HANDLING
            | Feature::STATISTICS;
        if self.providers.vector_store.is_some() {
            features |= Feature::BASIC_SEARCH;
            if self.providers.dense.is_some() {
                features |= Feature::VECTOR_INDEXING | Feature::VECTOR_SEARCH;
            }
            if self.providers.sparse.is_some() {
                features |= Feature::SPARSE_INDEXING;
            }
            if self.providers.dense.is_some() && self.providers.sparse.is_some() {
                features |= Feature::HYBRID_SEARCH;
            }
        }
        features.resolve_all_dependencies()
    }

    fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.vector_store.timeout_seconds)
    }

    fn should_checkpoint(&self) -> bool {
        if self.files_since_checkpoint.load(Ordering::Relaxed)
            >= self.config.indexing.checkpoint_every_files
        {
            return true;
        }
        self.last_checkpoint_at
            .lock()
            .map(|at| at.elapsed().as_secs() >= self.config.indexing.checkpoint_every_secs)
            .unwrap_or(false)
    }

    async fn save_checkpoint(&self) -> IndexingResult<()> {
        let (has_manifest, manifest_count) = {
            let manifest = self.manifest.lock().await;
            (!manifest.is_empty(), manifest.len())
        };
        let checkpoint = IndexingCheckpoint::from_stats(
            &self.project_path,
            self.config.settings_hash(),
            &self.stats(),
            has_manifest,
            manifest_count,
        );
        self.checkpoint_manager.save(&checkpoint)?;
        self.files_since_checkpoint.store(0, Ordering::Relaxed);
        if let Ok(mut at) = self.last_checkpoint_at.lock() {
            *at = Instant::now();
        }
        Ok(())
    }

    async fn save_manifest(&self) -> IndexingResult<()> {
        let manifest = self.manifest.lock().await;
        self.manifest_manager.save(&manifest)
    }

    /// Discovery: walk the project and hash every candidate file.
    fn discover_files(&self) -> IndexingResult<Vec<DiscoveredFile>> {
        let walker = FileWalker::new(&self.project_path, self.config.indexing.clone());
        let paths = walker.walk()?;

        // Hashing is CPU-bound; fan it out.
        let root = self.project_path.clone();
        let mut discovered: Vec<DiscoveredFile> = paths
            .par_iter()
            .filter_map(|path| match DiscoveredFile::from_path(path) {
                Ok(mut file) => {
                    if let Ok(relative) = path.strip_prefix(&root) {
                        file.path = relative.to_path_buf();
                    }
                    Some(file)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Discovery read failed: {e}");
                    None
                }
            })
            .collect();
        discovered.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(discovered)
    }

    /// Remove deleted files from the store and manifest. Runs before any
    /// new/modified processing so reused paths can never collide with
    /// stale chunks.
    async fn process_deletions(&self, deleted: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in deleted {
            if let Some(store) = &self.providers.vector_store {
                let timeout = self.store_timeout();
                let outcome = retry_with_backoff(&self.config.retry, "delete_by_file", || {
                    with_timeout(timeout, "delete_by_file", store.delete_by_file(path))
                })
                .await;
                if let Err(e) = outcome {
                    self.record_file_error(path, &e);
                    continue;
                }
            }
            let mut manifest = self.manifest.lock().await;
            if manifest.remove_file(path).is_some() {
                removed += 1;
            }
        }
        removed
    }

    fn read_file_content(&self, relative: &Path) -> std::io::Result<String> {
        let absolute = self.project_path.join(relative);
        let bytes = std::fs::read(&absolute)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn embed_dense_for_chunks(
        &self,
        provider: &Arc<dyn EmbeddingProvider>,
        ids: &[Uuid],
        texts: &[String],
    ) -> IndexingResult<usize> {
        let mut embedded = 0;
        let batch_size = self.config.indexing.embedding_batch_size.max(1);
        for (id_batch, text_batch) in ids.chunks(batch_size).zip(texts.chunks(batch_size)) {
            let refs: Vec<&str> = text_batch.iter().map(String::as_str).collect();
            let rows = retry_with_backoff(&self.config.retry, "embed_documents", || {
                provider.embed_documents(&refs)
            })
            .await?;
            for (id, row) in id_batch.iter().zip(rows) {
                self.embedding_registry.set_dense(*id, row);
                embedded += 1;
            }
        }
        Ok(embedded)
    }

    async fn embed_sparse_for_chunks(
        &self,
        provider: &Arc<dyn SparseEmbeddingProvider>,
        ids: &[Uuid],
        texts: &[String],
    ) -> IndexingResult<usize> {
        let mut embedded = 0;
        let batch_size = self.config.indexing.embedding_batch_size.max(1);
        for (id_batch, text_batch) in ids.chunks(batch_size).zip(texts.chunks(batch_size)) {
            let refs: Vec<&str> = text_batch.iter().map(String::as_str).collect();
            let rows = retry_with_backoff(&self.config.retry, "embed_documents_sparse", || {
                provider.embed_documents(&refs)
            })
            .await?;
            for (id, row) in id_batch.iter().zip(rows) {
                self.embedding_registry.set_sparse(*id, row);
                embedded += 1;
            }
        }
        Ok(embedded)
    }

    /// Full pipeline for one file: chunk, embed, upsert, record.
    async fn index_single_file(&self, file: &DiscoveredFile, replace: bool) -> IndexingResult<()> {
        let content = self.read_file_content(&file.path)?;
        let chunks = self.chunking.chunk_file(file, &content)?;
        let chunk_ids: Vec<Uuid> = chunks.iter().map(|c| c.chunk_id).collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let chunk_count = chunks.len();

        if let Ok(mut stats) = self.stats.lock() {
            stats.chunks_created += chunk_count;
        }
        self.embedding_registry.register(chunks);

        let mut dense_embedded = 0;
        if let Some(provider) = &self.providers.dense {
            dense_embedded = self
                .embed_dense_for_chunks(provider, &chunk_ids, &texts)
                .await?;
        }
        let mut sparse_embedded = 0;
        if let Some(provider) = &self.providers.sparse {
            sparse_embedded = self
                .embed_sparse_for_chunks(provider, &chunk_ids, &texts)
                .await?;
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.chunks_embedded += dense_embedded.max(sparse_embedded);
        }

        // The registry is the single source of truth for vectors: fetch the
        // updated chunks back out before upsert.
        let updated: Vec<CodeChunk> = self.embedding_registry.fetch(&chunk_ids);

        if let Some(store) = &self.providers.vector_store {
            let timeout = self.store_timeout();
            if replace {
                retry_with_backoff(&self.config.retry, "delete_by_file", || {
                    with_timeout(timeout, "delete_by_file", store.delete_by_file(&file.path))
                })
                .await?;
            }
            retry_with_backoff(&self.config.retry, "upsert", || {
                with_timeout(timeout, "upsert", store.upsert(&updated))
            })
            .await?;
        } else {
            tracing::warn!("No vector store configured; skipping storage phase");
        }

        let has_dense = dense_embedded == chunk_count && chunk_count > 0;
        let has_sparse = sparse_embedded == chunk_count && chunk_count > 0;
        {
            let mut manifest = self.manifest.lock().await;
            manifest.add_file(
                &file.path,
                file.content_hash.clone(),
                chunk_ids.clone(),
                self.providers
                    .dense
                    .as_ref()
                    .map(|p| p.provider_name().to_string()),
                self.providers
                    .dense
                    .as_ref()
                    .map(|p| p.model_name().to_string()),
                self.providers
                    .sparse
                    .as_ref()
                    .map(|p| p.provider_name().to_string()),
                self.providers
                    .sparse
                    .as_ref()
                    .map(|p| p.model_name().to_string()),
                has_dense,
                has_sparse,
            );
            self.manifest_manager.save(&manifest)?;
        }

        self.embedding_registry.release(&chunk_ids);
        if let Ok(mut stats) = self.stats.lock() {
            stats.files_processed += 1;
            stats.chunks_indexed += chunk_count;
        }
        self.files_since_checkpoint.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Process one batch of files. Per-file errors are recorded and do not
    /// abort the batch; only fatal errors (manifest/checkpoint writes)
    /// propagate.
    async fn index_files_batch(
        &self,
        batch: &[DiscoveredFile],
        modified: &std::collections::HashSet<PathBuf>,
    ) -> IndexingResult<()> {
        for file in batch {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let replace = modified.contains(&file.path);
            if let Err(e) = self.index_single_file(file, replace).await {
                if e.is_fatal() {
                    return Err(e);
                }
                self.record_file_error(&file.path, &e);
            }
        }
        self.emit_progress(IndexingPhase::Embedding);
        self.emit_progress(IndexingPhase::Storage);

        if self.should_checkpoint() {
            self.save_checkpoint().await?;
        }
        Ok(())
    }

    /// Bring the index up to date with the project.
    ///
    /// Cold starts index everything; incremental runs skip unchanged files
    /// by content hash, replace modified ones, clean up deletions first,
    /// and reconcile missing embedding kinds once per call (unless
    /// `force_reindex`).
    ///
    /// # Errors
    ///
    /// Only manifest/checkpoint write failures abort the run.
    #[tracing::instrument(skip(self), fields(project = %self.project_path.display(), force_reindex, run_id))]
    pub async fn prime_index(&self, force_reindex: bool) -> IndexingResult<IndexingReport> {
        let run_id = CorrelationId::new();
        tracing::Span::current().record("run_id", run_id.to_string());
        self.register_signal_handlers();
        if let Ok(mut stats) = self.stats.lock() {
            *stats = IndexingStats::new();
        }

        // What this configuration can actually do; anything hybrid search
        // needs but the providers don't cover is called out up front.
        let features = self.advertised_features();
        if !features.contains(Feature::HYBRID_SEARCH) {
            let missing = Feature::minimal_set_for(&[Feature::HYBRID_SEARCH]) & !features;
            tracing::info!(
                run_id = %run_id,
                missing = %missing,
                "Hybrid indexing unavailable with the configured providers"
            );
        }
        tracing::info!(run_id = %run_id, features = %features, "Indexing run starting");

        if force_reindex {
            let mut manifest = self.manifest.lock().await;
            *manifest = IndexFileManifest::new(&self.project_path);
        } else if let Some(checkpoint) =
            self.checkpoint_manager.load(&self.config.settings_hash())
        {
            tracing::info!(
                files_indexed = checkpoint.files_indexed,
                "Resuming from checkpoint"
            );
        }

        // Discovery
        let discovered = self.discover_files()?;
        if let Ok(mut stats) = self.stats.lock() {
            stats.files_discovered = discovered.len();
        }
        self.emit_progress(IndexingPhase::Discovery);

        // Incremental filter
        let change_set: ChangeSet = {
            let manifest = self.manifest.lock().await;
            manifest.diff(discovered)
        };
        tracing::info!(
            new = change_set.new.len(),
            modified = change_set.modified.len(),
            unchanged = change_set.unchanged.len(),
            deleted = change_set.deleted.len(),
            "Incremental filter complete"
        );

        // Deletions before anything else
        let files_deleted = self.process_deletions(&change_set.deleted).await;
        if files_deleted > 0 {
            self.save_manifest().await?;
        }

        // Reconciliation, once per non-forced run. Nothing here may abort
        // the outer indexing pass.
        if !force_reindex {
            let want_dense = self.providers.dense.is_some();
            let want_sparse = self.providers.sparse.is_some();
            let needs_pass = {
                let manifest = self.manifest.lock().await;
                !manifest
                    .files_missing_embeddings(want_dense, want_sparse)
                    .is_empty()
            };
            if needs_pass {
                match self
                    .add_missing_embeddings_to_existing_chunks(want_dense, want_sparse)
                    .await
                {
                    Ok(report) => tracing::info!(
                        files = report.files_processed,
                        chunks = report.chunks_updated,
                        errors = report.errors.len(),
                        "Reconciliation complete"
                    ),
                    Err(e) => tracing::error!("Reconciliation failed (continuing): {e}"),
                }
            }
        }

        // Batched pipeline
        let modified_paths: std::collections::HashSet<PathBuf> = change_set
            .modified
            .iter()
            .map(|f| f.path.clone())
            .collect();
        let to_index: Vec<DiscoveredFile> = change_set.to_index().cloned().collect();
        for batch in to_index.chunks(self.config.indexing.file_batch_size.max(1)) {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("Shutdown requested; stopping at batch boundary");
                break;
            }
            self.emit_progress(IndexingPhase::Chunking);
            self.index_files_batch(batch, &modified_paths).await?;
        }

        // Finalize
        self.save_manifest().await?;
        self.save_checkpoint().await?;
        let stats = self.stats();
        if stats.files_with_errors.is_empty() && !self.shutdown.load(Ordering::Relaxed) {
            self.checkpoint_manager.delete();
        }
        self.cleanup_signal_handlers();

        Ok(IndexingReport {
            files_discovered: stats.files_discovered,
            files_processed: stats.files_processed,
            files_deleted,
            chunks_created: stats.chunks_created,
            chunks_embedded: stats.chunks_embedded,
            chunks_indexed: stats.chunks_indexed,
            files_with_errors: stats.files_with_errors,
        })
    }

    /// Reconciliation: add the requested missing embedding kinds to chunks
    /// already in the store.
    ///
    /// Selection is manifest-driven, but each stored point's `vector` field
    /// is inspected to confirm what is actually absent (named map vs bare
    /// dense list). Points that already carry the requested kinds cost no
    /// embedder calls and no `update_vectors` traffic.
    ///
    /// # Errors
    ///
    /// Returns an error only when no vector store is configured; per-file
    /// failures land in the report's `errors`.
    pub async fn add_missing_embeddings_to_existing_chunks(
        &self,
        add_dense: bool,
        add_sparse: bool,
    ) -> IndexingResult<ReconciliationReport> {
        let mut report = ReconciliationReport::default();
        if !add_dense && !add_sparse {
            return Ok(report);
        }
        let Some(store) = &self.providers.vector_store else {
            return Err(IndexingError::Configuration(
                "Reconciliation needs a vector store".to_string(),
            ));
        };

        let targets = {
            let manifest = self.manifest.lock().await;
            manifest.files_missing_embeddings(add_dense, add_sparse)
        };

        for path in targets {
            match self
                .reconcile_file(store, &path, add_dense, add_sparse)
                .await
            {
                Ok(updated) => {
                    report.files_processed += 1;
                    report.chunks_updated += updated;
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), "Reconciliation error: {e}");
                    report.errors.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if report.files_processed > 0 {
            self.save_manifest().await?;
        }
        Ok(report)
    }

    async fn reconcile_file(
        &self,
        store: &Arc<dyn VectorStoreProvider>,
        path: &Path,
        add_dense: bool,
        add_sparse: bool,
    ) -> IndexingResult<usize> {
        let chunk_ids = {
            let manifest = self.manifest.lock().await;
            match manifest.get(path) {
                Some(entry) => entry.chunk_ids.clone(),
                None => return Ok(0),
            }
        };
        if chunk_ids.is_empty() {
            return Ok(0);
        }

        let timeout = self.store_timeout();
        let points: Vec<StoredPoint> = retry_with_backoff(&self.config.retry, "retrieve", || {
            with_timeout(timeout, "retrieve", store.retrieve(&chunk_ids))
        })
        .await?;
        if points.is_empty() {
            return Ok(0);
        }

        struct PendingUpdate {
            id: Uuid,
            need_dense: bool,
            need_sparse: bool,
            text: String,
        }

        let mut pending: Vec<PendingUpdate> = Vec::new();
        for point in &points {
            let need_dense = add_dense && !point.vectors.has_dense();
            let need_sparse = add_sparse && !point.vectors.has_sparse();
            if !need_dense && !need_sparse {
                continue;
            }
            let Some(text) = point.payload.get("text").and_then(|v| v.as_str()) else {
                return Err(IndexingError::Other(format!(
                    "Point {} has no text payload",
                    point.id
                )));
            };
            pending.push(PendingUpdate {
                id: point.id,
                need_dense,
                need_sparse,
                text: text.to_string(),
            });
        }

        if pending.is_empty() {
            // The store already carries everything requested; flag the file
            // complete so it stops being selected.
            self.mark_file_complete(path, add_dense, add_sparse).await;
            return Ok(0);
        }

        // Generate only the embeddings that are actually missing.
        let mut dense_rows: std::collections::HashMap<Uuid, Vec<f32>> =
            std::collections::HashMap::new();
        if pending.iter().any(|p| p.need_dense) {
            let provider = self.providers.dense.as_ref().ok_or_else(|| {
                IndexingError::Configuration(
                    "Dense embeddings requested but no provider configured".to_string(),
                )
            })?;
            let needing: Vec<&PendingUpdate> = pending.iter().filter(|p| p.need_dense).collect();
            let texts: Vec<&str> = needing.iter().map(|p| p.text.as_str()).collect();
            let rows = retry_with_backoff(&self.config.retry, "embed_documents", || {
                provider.embed_documents(&texts)
            })
            .await?;
            for (update, row) in needing.iter().zip(rows) {
                dense_rows.insert(update.id, row);
            }
        }

        let mut sparse_rows: std::collections::HashMap<Uuid, SparseVec> =
            std::collections::HashMap::new();
        if pending.iter().any(|p| p.need_sparse) {
            let provider = self.providers.sparse.as_ref().ok_or_else(|| {
                IndexingError::Configuration(
                    "Sparse embeddings requested but no provider configured".to_string(),
                )
            })?;
            let needing: Vec<&PendingUpdate> = pending.iter().filter(|p| p.need_sparse).collect();
            let texts: Vec<&str> = needing.iter().map(|p| p.text.as_str()).collect();
            let rows = retry_with_backoff(&self.config.retry, "embed_documents_sparse", || {
                provider.embed_documents(&texts)
            })
            .await?;
            for (update, row) in needing.iter().zip(rows) {
                sparse_rows.insert(update.id, row);
            }
        }

        // One update_vectors call per file, carrying only the missing slots.
        let mut ids = Vec::new();
        let mut vectors = Vec::new();
        for update in &pending {
            let mut map = std::collections::BTreeMap::new();
            if update.need_dense {
                if let Some(row) = dense_rows.remove(&update.id) {
                    map.insert(
                        codeweaver_providers::DENSE_VECTOR_NAME.to_string(),
                        VectorData::Dense(row),
                    );
                }
            }
            if update.need_sparse {
                if let Some(row) = sparse_rows.remove(&update.id) {
                    map.insert(SPARSE_VECTOR_NAME.to_string(), VectorData::Sparse(row));
                }
            }
            if !map.is_empty() {
                ids.push(update.id);
                vectors.push(map);
            }
        }

        let updated = retry_with_backoff(&self.config.retry, "update_vectors", || {
            with_timeout(
                timeout,
                "update_vectors",
                store.update_vectors(&ids, vectors.clone()),
            )
        })
        .await?;

        // Flag the file complete for the kinds we just filled in.
        self.mark_file_complete(path, add_dense, add_sparse).await;

        Ok(updated)
    }

    async fn mark_file_complete(&self, path: &Path, add_dense: bool, add_sparse: bool) {
        let mut manifest = self.manifest.lock().await;
        if let Some(entry) = manifest.get_mut(path) {
            if add_dense {
                entry.has_dense_embeddings = true;
                if let Some(provider) = &self.providers.dense {
                    entry.dense_embedding_provider = Some(provider.provider_name().to_string());
                    entry.dense_embedding_model = Some(provider.model_name().to_string());
                }
            }
            if add_sparse {
                entry.has_sparse_embeddings = true;
                if let Some(provider) = &self.providers.sparse {
                    entry.sparse_embedding_provider = Some(provider.provider_name().to_string());
                    entry.sparse_embedding_model = Some(provider.model_name().to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_providers::{InMemoryVectorStore, MockEmbedding, MockSparseEmbedding};

    fn indexer_with(dense: bool, sparse: bool, store: bool, cache: &Path) -> Indexer {
        let providers = IndexerProviders {
            dense: dense.then(|| Arc::new(MockEmbedding::new(8)) as Arc<dyn EmbeddingProvider>),
            sparse: sparse
                .then(|| Arc::new(MockSparseEmbedding::new(64)) as Arc<dyn SparseEmbeddingProvider>),
            vector_store: store
                .then(|| Arc::new(InMemoryVectorStore::new()) as Arc<dyn VectorStoreProvider>),
        };
        let mut config = CodeWeaverConfig::default();
        config.indexing.cache_dir = Some(cache.to_path_buf());
        Indexer::with_providers(cache.join("project"), config, providers)
    }

    #[test]
    fn test_full_provider_set_advertises_hybrid() {
        let cache = tempfile::tempdir().unwrap();
        let features = indexer_with(true, true, true, cache.path()).advertised_features();
        assert!(features.contains(Feature::HYBRID_SEARCH));
        assert!(features.contains(Feature::SPARSE_INDEXING));
        assert!(features.validate_dependencies());
        assert!(features.missing_dependencies().is_empty());
    }

    #[test]
    fn test_dense_only_advertises_vector_search() {
        let cache = tempfile::tempdir().unwrap();
        let features = indexer_with(true, false, true, cache.path()).advertised_features();
        assert!(features.contains(Feature::VECTOR_SEARCH));
        assert!(!features.contains(Feature::HYBRID_SEARCH));
        assert!(features.validate_dependencies());
    }

    #[test]
    fn test_no_providers_still_discovers() {
        let cache = tempfile::tempdir().unwrap();
        let features = indexer_with(false, false, false, cache.path()).advertised_features();
        assert!(features.contains(Feature::FILE_DISCOVERY));
        assert!(!features.contains(Feature::BASIC_SEARCH));
        assert!(features.validate_dependencies());
    }

    #[test]
    fn test_store_without_embedders_is_basic_search_only() {
        let cache = tempfile::tempdir().unwrap();
        let features = indexer_with(false, false, true, cache.path()).advertised_features();
        assert!(features.contains(Feature::BASIC_SEARCH));
        assert!(!features.contains(Feature::VECTOR_SEARCH));
        assert!(!features.contains(Feature::SPARSE_INDEXING));
        assert!(features.validate_dependencies());
    }
}
