//! CodeWeaver indexing crate
//!
//! Maintains an up-to-date vector index for a project: gitignore-aware
//! discovery, BLAKE3-keyed incremental filtering, chunking, batched
//! embedding, vector-store upserts, manifest and checkpoint persistence,
//! reconciliation of missing embedding kinds, and graceful shutdown.

pub mod checkpoint;
pub mod embedding_registry;
pub mod error;
pub mod indexer;
pub mod manifest;
pub mod retry;
pub mod stats;
pub mod walker;

pub use checkpoint::{CHECKPOINT_FILE_NAME, CheckpointManager, IndexingCheckpoint};
pub use embedding_registry::EmbeddingRegistry;
pub use error::{IndexingError, IndexingResult};
pub use indexer::{Indexer, IndexerProviders, IndexingReport, ReconciliationReport};
pub use manifest::{
    ChangeSet, FileChangeKind, FileEntry, FileManifestManager, IndexFileManifest,
    MANIFEST_SCHEMA_VERSION,
};
pub use retry::retry_with_backoff;
pub use stats::{IndexingPhase, IndexingStats, ProgressCallback};
pub use walker::FileWalker;
