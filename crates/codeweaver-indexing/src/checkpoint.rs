//! Indexing checkpoints
//!
//! A checkpoint snapshots run progress so an interrupted indexing pass can
//! resume. A checkpoint is only honoured when its settings fingerprint
//! matches the current configuration and it is younger than the configured
//! age limit (24 h by default). Saved atomically; deleted after a fully
//! clean run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IndexingError, IndexingResult};
use crate::stats::IndexingStats;

/// Checkpoint file name inside the cache directory.
pub const CHECKPOINT_FILE_NAME: &str = "indexing_checkpoint.json";

/// Snapshot of one indexing run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingCheckpoint {
    pub project_path: PathBuf,
    /// BLAKE3 fingerprint of the indexing-relevant settings
    pub settings_hash: String,
    pub files_discovered: usize,
    pub files_embedded: usize,
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_indexed: usize,
    pub files_with_errors: Vec<PathBuf>,
    pub has_file_manifest: bool,
    pub manifest_file_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl IndexingCheckpoint {
    /// Build a checkpoint from live counters.
    pub fn from_stats(
        project_path: impl Into<PathBuf>,
        settings_hash: impl Into<String>,
        stats: &IndexingStats,
        has_file_manifest: bool,
        manifest_file_count: usize,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            settings_hash: settings_hash.into(),
            files_discovered: stats.files_discovered,
            files_embedded: stats.files_processed,
            files_indexed: stats.files_processed,
            chunks_created: stats.chunks_created,
            chunks_embedded: stats.chunks_embedded,
            chunks_indexed: stats.chunks_indexed,
            files_with_errors: stats.files_with_errors.clone(),
            has_file_manifest,
            manifest_file_count,
            timestamp: Utc::now(),
        }
    }

    /// Age in seconds relative to now.
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.timestamp).num_seconds()
    }
}

/// Loads, saves, and invalidates the checkpoint file.
pub struct CheckpointManager {
    path: PathBuf,
    max_age_secs: u64,
}

impl CheckpointManager {
    /// Manager for `<cache_dir>/indexing_checkpoint.json`.
    pub fn new(cache_dir: &Path, max_age_secs: u64) -> Self {
        Self {
            path: cache_dir.join(CHECKPOINT_FILE_NAME),
            max_age_secs,
        }
    }

    /// The checkpoint file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save atomically (temp + rename).
    ///
    /// # Errors
    ///
    /// Returns [`IndexingError::CheckpointWrite`] on any failure - this is
    /// the fatal error class.
    pub fn save(&self, checkpoint: &IndexingCheckpoint) -> IndexingResult<()> {
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| IndexingError::CheckpointWrite(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexingError::CheckpointWrite(e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| IndexingError::CheckpointWrite(e.to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| IndexingError::CheckpointWrite(e.to_string()))?;
        Ok(())
    }

    /// Load a checkpoint when it matches the current settings fingerprint
    /// and is within the age limit. Mismatch or staleness returns `None`.
    pub fn load(&self, current_settings_hash: &str) -> Option<IndexingCheckpoint> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let checkpoint: IndexingCheckpoint = match serde_json::from_str(&content) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Checkpoint unreadable: {e}");
                return None;
            }
        };

        if checkpoint.settings_hash != current_settings_hash {
            tracing::info!("Checkpoint ignored: settings changed since it was written");
            return None;
        }
        if checkpoint.age_seconds() > self.max_age_secs as i64 {
            tracing::info!(
                age_seconds = checkpoint.age_seconds(),
                "Checkpoint ignored: older than the age limit"
            );
            return None;
        }
        Some(checkpoint)
    }

    /// Remove the checkpoint (after a clean run).
    pub fn delete(&self) {
        if self.path.is_file() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Could not delete checkpoint: {e}");
            }
        }
    }
}
