//! Centralized configuration management for CodeWeaver
//!
//! This crate provides a unified configuration system with type-safe,
//! validated settings and support for multiple sources.
//!
//! Configuration follows a layered hierarchy (highest priority first):
//! 1. Direct constructor arguments
//! 2. Environment variables (`CODEWEAVER_` prefix, `__` nested delimiter)
//! 3. Local env file (loaded at process init)
//! 4. Local TOML/YAML/JSON config in the working directory
//! 5. Project config
//! 6. User-home config
//! 7. Global config
//! 8. Safe defaults (defined as constants)

pub mod error;
pub mod source;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use source::{ConfigurationLoader, ConfigurationSource, EnvironmentSource, FileSource};
pub use validation::Validate;

use std::collections::BTreeMap;
use std::path::PathBuf;

use codeweaver_common::hash::blake_hash;
use serde::{Deserialize, Serialize};

// =============================================================================
// SAFE DEFAULTS - Work for any environment (dev, staging, prod, test)
// =============================================================================

// Chunker Configuration
const DEFAULT_MAX_CHUNK_TOKENS: usize = 512;
const DEFAULT_CHUNK_OVERLAP_TOKENS: usize = 64;
const DEFAULT_RECURSIVE_CHUNK_CHARS: usize = 2000;

// Indexing Configuration
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 100; // Provider batch cap
const DEFAULT_FILE_BATCH_SIZE: usize = 32;
const DEFAULT_CHECKPOINT_EVERY_FILES: usize = 100;
const DEFAULT_CHECKPOINT_EVERY_SECS: u64 = 300; // 5 minutes
const DEFAULT_CHECKPOINT_MAX_AGE_SECS: u64 = 86_400; // 24 hours
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_INCLUDE_TOOLING_DIRS: bool = true;

// Vector Storage Configuration
const DEFAULT_VECTOR_STORE_URL: &str = "http://localhost:6334";
const DEFAULT_COLLECTION_NAME: &str = "codeweaver";
const DEFAULT_VECTOR_DIMENSION: usize = 768;
const DEFAULT_VECTOR_TIMEOUT_SECONDS: u64 = 30;

// Retry / backoff (provider calls)
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 60_000;
const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 5;

/// Core configuration for the entire CodeWeaver engine
///
/// All settings have safe defaults and can be overridden via layered file
/// sources and environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeWeaverConfig {
    /// Provider selection per kind
    pub providers: ProviderSelectionConfig,

    /// Chunker behavior
    pub chunker: ChunkerConfig,

    /// Indexing pipeline behavior
    pub indexing: IndexingConfig,

    /// Vector storage connection settings
    pub vector_store: VectorStoreConfig,

    /// Retry/backoff policy for provider calls
    pub retry: RetryConfig,
}

impl Default for CodeWeaverConfig {
    fn default() -> Self {
        Self {
            providers: ProviderSelectionConfig::default(),
            chunker: ChunkerConfig::default(),
            indexing: IndexingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// One configured provider for a kind: which backend, which model, whether
/// the user has enabled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Backend identifier (e.g. "memory", "qdrant", "mock-embedding")
    pub provider: String,

    /// Model name, for kinds that have one
    #[serde(default)]
    pub model: Option<String>,

    /// Whether the entry is active. Disabled entries are kept in config
    /// files but ignored by the registry.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Backend-specific options passed through to the factory
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ProviderEntry {
    /// Entry for a backend with no model.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            enabled: true,
            options: BTreeMap::new(),
        }
    }

    /// Entry for a backend bound to a model.
    pub fn with_model(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: Some(model.into()),
            enabled: true,
            options: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-kind provider selection. `None` means the kind is not configured;
/// the engine degrades per its failure policy instead of refusing to start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSelectionConfig {
    pub embedding: Option<ProviderEntry>,
    pub sparse_embedding: Option<ProviderEntry>,
    pub reranking: Option<ProviderEntry>,
    pub vector_store: Option<ProviderEntry>,
}

impl ProviderSelectionConfig {
    /// The enabled entry for a kind name, if any.
    pub fn enabled_entry(&self, kind: &str) -> Option<&ProviderEntry> {
        let entry = match kind {
            "embedding" => self.embedding.as_ref(),
            "sparse_embedding" => self.sparse_embedding.as_ref(),
            "reranking" => self.reranking.as_ref(),
            "vector_store" => self.vector_store.as_ref(),
            _ => None,
        };
        entry.filter(|e| e.enabled)
    }
}

/// Chunker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Token budget for a single chunk (semantic strategy merges nested
    /// nodes while under this limit)
    pub max_chunk_tokens: usize,

    /// Overlap between consecutive chunks produced by the recursive splitter
    pub overlap_tokens: usize,

    /// Character window for the recursive splitter's fallback
    pub recursive_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: DEFAULT_MAX_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_CHUNK_OVERLAP_TOKENS,
            recursive_chunk_chars: DEFAULT_RECURSIVE_CHUNK_CHARS,
        }
    }
}

/// Indexing pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Maximum chunks per embedding provider call
    pub embedding_batch_size: usize,

    /// Files processed per pipeline batch
    pub file_batch_size: usize,

    /// Save a checkpoint every N processed files
    pub checkpoint_every_files: usize,

    /// Save a checkpoint at least every N seconds
    pub checkpoint_every_secs: u64,

    /// Checkpoints older than this are ignored on restore
    pub checkpoint_max_age_secs: u64,

    /// Directory for manifest and checkpoint files; defaults to the
    /// platform cache dir
    pub cache_dir: Option<PathBuf>,

    /// User include globs (empty = everything the walker allows)
    pub include_globs: Vec<String>,

    /// User exclude globs
    pub exclude_globs: Vec<String>,

    /// Whether hidden files are walked
    pub include_hidden: bool,

    /// Force-include tooling directories (.github, .circleci, agent config
    /// dirs) even when hidden-file filtering would skip them
    pub include_tooling_dirs: bool,

    /// Files larger than this are skipped
    pub max_file_size_bytes: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            file_batch_size: DEFAULT_FILE_BATCH_SIZE,
            checkpoint_every_files: DEFAULT_CHECKPOINT_EVERY_FILES,
            checkpoint_every_secs: DEFAULT_CHECKPOINT_EVERY_SECS,
            checkpoint_max_age_secs: DEFAULT_CHECKPOINT_MAX_AGE_SECS,
            cache_dir: None,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            include_hidden: false,
            include_tooling_dirs: DEFAULT_INCLUDE_TOOLING_DIRS,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }
}

impl IndexingConfig {
    /// Resolve the cache directory, falling back to the platform cache dir.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("codeweaver")
        })
    }
}

/// Vector storage connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Backend URL (for networked stores)
    pub url: String,

    /// Collection name
    pub collection: String,

    /// Dense vector dimensionality; must match the embedding model
    pub dimensions: usize,

    /// Per-call timeout
    pub timeout_seconds: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_VECTOR_STORE_URL.to_string(),
            collection: DEFAULT_COLLECTION_NAME.to_string(),
            dimensions: DEFAULT_VECTOR_DIMENSION,
            timeout_seconds: DEFAULT_VECTOR_TIMEOUT_SECONDS,
        }
    }
}

/// Retry/backoff policy for provider calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First retry delay in milliseconds
    pub base_delay_ms: u64,

    /// Exponential factor between attempts
    pub factor: u32,

    /// Delay ceiling in milliseconds
    pub max_delay_ms: u64,

    /// Retry attempts before the call fails
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            factor: 2,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
        }
    }
}

impl CodeWeaverConfig {
    /// Load configuration from all layered sources.
    ///
    /// # Errors
    ///
    /// Returns an error when a present file source fails to parse, or when
    /// the merged configuration fails validation.
    pub fn load() -> ConfigResult<Self> {
        ConfigurationLoader::with_default_sources().load()
    }

    /// Fingerprint of the settings that affect indexing output.
    ///
    /// BLAKE3 over a canonical (sorted-key) JSON serialization of the
    /// provider selection, chunker, and walker subset. Any drift in these
    /// invalidates a saved checkpoint; cosmetic settings (timeouts, retry
    /// policy) are deliberately excluded.
    pub fn settings_hash(&self) -> String {
        #[derive(Serialize)]
        struct IndexingSubset<'a> {
            providers: &'a ProviderSelectionConfig,
            chunker: &'a ChunkerConfig,
            include_globs: &'a [String],
            exclude_globs: &'a [String],
            include_hidden: bool,
            include_tooling_dirs: bool,
            max_file_size_bytes: u64,
        }

        let subset = IndexingSubset {
            providers: &self.providers,
            chunker: &self.chunker,
            include_globs: &self.indexing.include_globs,
            exclude_globs: &self.indexing.exclude_globs,
            include_hidden: self.indexing.include_hidden,
            include_tooling_dirs: self.indexing.include_tooling_dirs,
            max_file_size_bytes: self.indexing.max_file_size_bytes,
        };

        let canonical = serde_json::to_value(&subset)
            .map(|v| canonical_json(&v))
            .unwrap_or_default();
        blake_hash(canonical.as_bytes()).to_string()
    }
}

/// Serialize a JSON value with all object keys sorted, recursively.
///
/// `serde_json` already orders `Map` keys when the `preserve_order` feature
/// is off, but we sort explicitly so the fingerprint does not depend on
/// feature unification.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .filter_map(|k| {
                    map.get(k)
                        .map(|v| format!("{}:{}", serde_json::Value::from(k.as_str()), canonical_json(v)))
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        serde_json::Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_safe() {
        let config = CodeWeaverConfig::default();
        assert_eq!(config.indexing.embedding_batch_size, 100);
        assert_eq!(config.indexing.checkpoint_every_files, 100);
        assert_eq!(config.indexing.checkpoint_every_secs, 300);
        assert_eq!(config.vector_store.dimensions, 768);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.providers.embedding.is_none());
    }

    #[test]
    fn test_settings_hash_is_stable() {
        let a = CodeWeaverConfig::default();
        let b = CodeWeaverConfig::default();
        assert_eq!(a.settings_hash(), b.settings_hash());
    }

    #[test]
    fn test_settings_hash_tracks_indexing_settings() {
        let base = CodeWeaverConfig::default();

        let mut chunker_changed = base.clone();
        chunker_changed.chunker.max_chunk_tokens = 1024;
        assert_ne!(base.settings_hash(), chunker_changed.settings_hash());

        let mut provider_changed = base.clone();
        provider_changed.providers.embedding =
            Some(ProviderEntry::with_model("mock-embedding", "mock-dense-768"));
        assert_ne!(base.settings_hash(), provider_changed.settings_hash());
    }

    #[test]
    fn test_settings_hash_ignores_cosmetic_settings() {
        let base = CodeWeaverConfig::default();
        let mut retry_changed = base.clone();
        retry_changed.retry.max_attempts = 2;
        retry_changed.vector_store.timeout_seconds = 5;
        assert_eq!(base.settings_hash(), retry_changed.settings_hash());
    }

    #[test]
    fn test_enabled_entry_respects_disabled_flag() {
        let mut config = CodeWeaverConfig::default();
        let mut entry = ProviderEntry::new("memory");
        entry.enabled = false;
        config.providers.vector_store = Some(entry);
        assert!(config.providers.enabled_entry("vector_store").is_none());

        config.providers.vector_store = Some(ProviderEntry::new("memory"));
        assert_eq!(
            config
                .providers
                .enabled_entry("vector_store")
                .map(|e| e.provider.as_str()),
            Some("memory")
        );
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = serde_json::json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(canonical_json(&value), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }
}
