//! Incremental indexing behavior over a real (temporary) project tree:
//! cold start, unchanged-repo idempotence, modification handling, and
//! deletion cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeweaver_common::hash::blake_hash;
use codeweaver_config::{CodeWeaverConfig, RetryConfig};
use codeweaver_indexing::{FileManifestManager, Indexer, IndexerProviders};
use codeweaver_providers::{
    InMemoryVectorStore, MockEmbedding, MockSparseEmbedding, VectorStoreProvider,
};

fn test_config(cache_dir: &Path) -> CodeWeaverConfig {
    codeweaver_common::init_tracing();
    let mut config = CodeWeaverConfig::default();
    config.indexing.cache_dir = Some(cache_dir.to_path_buf());
    config.retry = RetryConfig {
        base_delay_ms: 1,
        factor: 2,
        max_delay_ms: 4,
        max_attempts: 1,
    };
    config
}

fn providers(store: &Arc<InMemoryVectorStore>) -> IndexerProviders {
    IndexerProviders {
        dense: Some(Arc::new(MockEmbedding::new(64))),
        sparse: Some(Arc::new(MockSparseEmbedding::new(1000))),
        vector_store: Some(Arc::clone(store) as Arc<dyn VectorStoreProvider>),
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_cold_start_indexes_everything() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(project.path(), "a.py", "def a():\n    return 1\n");
    write(project.path(), "b.py", "def b():\n    return 2\n");

    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = Indexer::with_providers(
        project.path(),
        test_config(cache.path()),
        providers(&store),
    );

    let report = indexer.prime_index(false).await.unwrap();
    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_processed, 2);
    assert!(report.chunks_created >= 2);
    assert!(report.files_with_errors.is_empty());
    assert!(!store.is_empty());
}

#[tokio::test]
async fn test_unchanged_repo_is_idempotent() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(project.path(), "a.py", "def a():\n    return 1\n");
    write(project.path(), "b.py", "def b():\n    return 2\n");

    let store = Arc::new(InMemoryVectorStore::new());
    let config = test_config(cache.path());

    let first = Indexer::with_providers(project.path(), config.clone(), providers(&store));
    first.prime_index(false).await.unwrap();

    let manifest_manager = FileManifestManager::new(cache.path(), project.path());
    let manifest_after_first = manifest_manager.load().unwrap();

    // Second pass over the unchanged repository: nothing re-indexed, and
    // the persisted manifest is byte-for-byte stable.
    let second = Indexer::with_providers(project.path(), config, providers(&store));
    let report = second.prime_index(false).await.unwrap();
    assert_eq!(report.files_processed, 0);
    assert_eq!(report.chunks_created, 0);

    let manifest_after_second = manifest_manager.load().unwrap();
    assert_eq!(manifest_after_first, manifest_after_second);
}

#[tokio::test]
async fn test_modified_file_is_reindexed_and_old_chunks_removed() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(project.path(), "a.py", "def a():\n    return 1\n");
    write(project.path(), "b.py", "def b():\n    return 2\n");

    let store = Arc::new(InMemoryVectorStore::new());
    let config = test_config(cache.path());

    let first = Indexer::with_providers(project.path(), config.clone(), providers(&store));
    first.prime_index(false).await.unwrap();

    let manifest_manager = FileManifestManager::new(cache.path(), project.path());
    let old_chunk_ids = manifest_manager
        .load()
        .unwrap()
        .get(Path::new("b.py"))
        .unwrap()
        .chunk_ids
        .clone();
    assert!(!old_chunk_ids.is_empty());
    assert!(old_chunk_ids.iter().all(|id| store.contains(id)));

    // Change b.py's content
    write(project.path(), "b.py", "def b():\n    return 42\n");

    let third = Indexer::with_providers(project.path(), config, providers(&store));
    let report = third.prime_index(false).await.unwrap();
    assert_eq!(report.files_processed, 1);

    // Old chunk ids are gone from the store; the manifest carries new ones
    assert!(old_chunk_ids.iter().all(|id| !store.contains(id)));
    let new_chunk_ids = manifest_manager
        .load()
        .unwrap()
        .get(Path::new("b.py"))
        .unwrap()
        .chunk_ids
        .clone();
    assert!(new_chunk_ids.iter().all(|id| !old_chunk_ids.contains(id)));
    assert!(new_chunk_ids.iter().all(|id| store.contains(id)));
}

#[tokio::test]
async fn test_deleted_file_cleanup_runs_before_additions() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(project.path(), "keep.py", "def keep():\n    pass\n");
    write(project.path(), "gone.py", "def gone():\n    pass\n");

    let store = Arc::new(InMemoryVectorStore::new());
    let config = test_config(cache.path());

    let first = Indexer::with_providers(project.path(), config.clone(), providers(&store));
    first.prime_index(false).await.unwrap();

    let manifest_manager = FileManifestManager::new(cache.path(), project.path());
    let gone_ids = manifest_manager
        .load()
        .unwrap()
        .get(Path::new("gone.py"))
        .unwrap()
        .chunk_ids
        .clone();

    std::fs::remove_file(project.path().join("gone.py")).unwrap();
    write(project.path(), "fresh.py", "def fresh():\n    pass\n");

    let second = Indexer::with_providers(project.path(), config, providers(&store));
    let report = second.prime_index(false).await.unwrap();
    assert_eq!(report.files_deleted, 1);
    assert_eq!(report.files_processed, 1);

    assert!(gone_ids.iter().all(|id| !store.contains(id)));
    let manifest = manifest_manager.load().unwrap();
    assert!(manifest.get(Path::new("gone.py")).is_none());
    assert!(manifest.get(Path::new("fresh.py")).is_some());
}

#[tokio::test]
async fn test_manifest_hashes_match_disk_content() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let content = "def hashed():\n    return 'stable'\n";
    write(project.path(), "hashed.py", content);

    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = Indexer::with_providers(
        project.path(),
        test_config(cache.path()),
        providers(&store),
    );
    indexer.prime_index(false).await.unwrap();

    let manifest = FileManifestManager::new(cache.path(), project.path())
        .load()
        .unwrap();
    let entry = manifest.get(Path::new("hashed.py")).unwrap();
    assert_eq!(entry.content_hash, blake_hash(content.as_bytes()));
    assert!(entry.has_dense_embeddings);
    assert!(entry.has_sparse_embeddings);
}

#[tokio::test]
async fn test_checkpoint_removed_after_clean_run() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(project.path(), "ok.py", "def ok():\n    pass\n");

    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = Indexer::with_providers(
        project.path(),
        test_config(cache.path()),
        providers(&store),
    );
    let report = indexer.prime_index(false).await.unwrap();
    assert!(report.files_with_errors.is_empty());

    let checkpoint_path: PathBuf = cache
        .path()
        .join(codeweaver_indexing::CHECKPOINT_FILE_NAME);
    assert!(!checkpoint_path.exists());
}

#[tokio::test]
async fn test_missing_providers_degrade_gracefully() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(project.path(), "solo.py", "def solo():\n    pass\n");

    // No embedders, no store: indexing still completes without errors.
    let indexer = Indexer::with_providers(
        project.path(),
        test_config(cache.path()),
        IndexerProviders::default(),
    );
    let report = indexer.prime_index(false).await.unwrap();
    assert_eq!(report.files_processed, 1);
    assert!(report.files_with_errors.is_empty());

    let manifest = FileManifestManager::new(cache.path(), project.path())
        .load()
        .unwrap();
    let entry = manifest.get(Path::new("solo.py")).unwrap();
    assert!(!entry.has_dense_embeddings);
    assert!(!entry.has_sparse_embeddings);
}
