//! Configuration source loading and composition
//!
//! Sources are merged lowest-priority-first into a JSON tree, then the
//! merged tree is deserialized into [`CodeWeaverConfig`] and validated.
//! File sources that do not exist are skipped silently; file sources that
//! exist but fail to parse are hard errors.

use std::path::{Path, PathBuf};

use codeweaver_common::initialize_environment;

use crate::validation::Validate;
use crate::{CodeWeaverConfig, ConfigError, ConfigResult};

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "CODEWEAVER_";

/// Nested-field delimiter inside override variable names.
const ENV_NESTED_DELIMITER: &str = "__";

/// Trait for loading configuration from different sources
pub trait ConfigurationSource {
    /// Load this source's (partial) configuration as a JSON tree.
    ///
    /// Returns `Ok(None)` when the source is absent (e.g. no config file).
    ///
    /// # Errors
    /// Returns configuration loading errors for present-but-invalid sources.
    fn load(&self) -> ConfigResult<Option<serde_json::Value>>;

    /// Get the name of this configuration source
    fn name(&self) -> &str;

    /// Get the priority of this source (higher number = higher priority)
    fn priority(&self) -> u8;
}

/// Load configuration overrides from `CODEWEAVER_*` environment variables.
///
/// `CODEWEAVER_INDEXING__FILE_BATCH_SIZE=64` maps to
/// `indexing.file_batch_size = 64`. Values parse as JSON scalars first and
/// fall back to plain strings.
pub struct EnvironmentSource;

impl ConfigurationSource for EnvironmentSource {
    fn load(&self) -> ConfigResult<Option<serde_json::Value>> {
        // Pull in the nearest .env file first. dotenvy never overwrites
        // variables already present, which is exactly the documented
        // precedence: real environment > env file > config files.
        initialize_environment();

        let mut root = serde_json::Value::Object(serde_json::Map::new());
        let mut any = false;

        for (key, raw) in std::env::vars() {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<String> = stripped
                .split(ENV_NESTED_DELIMITER)
                .map(str::to_lowercase)
                .collect();
            if path.iter().any(String::is_empty) {
                continue;
            }

            let value = serde_json::from_str(&raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
            set_path(&mut root, &path, value);
            any = true;
        }

        Ok(any.then_some(root))
    }

    fn name(&self) -> &'static str {
        "environment"
    }

    fn priority(&self) -> u8 {
        100 // Highest priority - environment variables override all files
    }
}

/// Supported config file formats, selected by extension.
#[derive(Debug, Clone, Copy)]
enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load configuration from a TOML/YAML/JSON file.
pub struct FileSource {
    path: PathBuf,
    priority: u8,
    label: String,
}

impl FileSource {
    /// File source with an explicit priority and debug label.
    pub fn new<P: AsRef<Path>>(path: P, priority: u8, label: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            priority,
            label: label.into(),
        }
    }
}

impl ConfigurationSource for FileSource {
    fn load(&self) -> ConfigResult<Option<serde_json::Value>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let Some(format) = FileFormat::from_path(&self.path) else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(&self.path)?;
        let value = match format {
            FileFormat::Toml => {
                let parsed: toml::Value = toml::from_str(&content)?;
                serde_json::to_value(parsed)?
            }
            FileFormat::Yaml => {
                let parsed: serde_yaml::Value = serde_yaml::from_str(&content)?;
                serde_json::to_value(parsed)?
            }
            FileFormat::Json => serde_json::from_str(&content)?,
        };

        Ok(Some(value))
    }

    fn name(&self) -> &str {
        &self.label
    }

    fn priority(&self) -> u8 {
        self.priority
    }
}

/// Type alias for configuration sources
type ConfigSources = Vec<Box<dyn ConfigurationSource>>;

/// Configuration loader that combines multiple sources
pub struct ConfigurationLoader {
    sources: ConfigSources,
}

impl Default for ConfigurationLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Candidate config file basenames, tried in order within each directory.
const CONFIG_BASENAMES: [&str; 4] = [
    "codeweaver.toml",
    "codeweaver.yaml",
    "codeweaver.yml",
    "codeweaver.json",
];

impl ConfigurationLoader {
    /// Empty loader.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Loader pre-populated with the standard layered sources:
    /// global config < user-home config < project config < CWD config <
    /// environment variables.
    pub fn with_default_sources() -> Self {
        let mut loader = Self::new();

        // Global (lowest file priority)
        for name in CONFIG_BASENAMES {
            loader = loader.add_source(Box::new(FileSource::new(
                Path::new("/etc/codeweaver").join(name),
                10,
                "global_config",
            )));
        }

        // User home
        if let Some(config_dir) = dirs::config_dir() {
            for name in CONFIG_BASENAMES {
                loader = loader.add_source(Box::new(FileSource::new(
                    config_dir.join("codeweaver").join(name),
                    20,
                    "user_config",
                )));
            }
        }

        // Project root (nearest ancestor of CWD with a config file)
        if let Some(project_dir) = find_project_config_dir() {
            for name in CONFIG_BASENAMES {
                loader = loader.add_source(Box::new(FileSource::new(
                    project_dir.join(name),
                    30,
                    "project_config",
                )));
            }
        }

        // Working directory
        for name in CONFIG_BASENAMES {
            loader = loader.add_source(Box::new(FileSource::new(name, 40, "local_config")));
        }

        loader.add_source(Box::new(EnvironmentSource))
    }

    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigurationSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Load configuration from all sources with priority ordering
    ///
    /// # Errors
    /// Returns configuration loading or validation errors
    pub fn load(&self) -> ConfigResult<CodeWeaverConfig> {
        // Start from defaults
        let mut merged = serde_json::to_value(CodeWeaverConfig::default())?;

        // Sort sources by priority (lowest first, so highest priority overwrites)
        let mut sorted_sources = self.sources.iter().collect::<Vec<_>>();
        sorted_sources.sort_by_key(|source| source.priority());

        for source in sorted_sources {
            match source.load() {
                Ok(Some(value)) => {
                    tracing::debug!("Loaded configuration from source: {}", source.name());
                    merge_values(&mut merged, value);
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(ConfigError::Generic {
                        message: format!("Failed to load source '{}': {e}", source.name()),
                    });
                }
            }
        }

        let config: CodeWeaverConfig = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }
}

/// Walk up from CWD looking for a directory that carries a config file,
/// stopping at the filesystem root.
fn find_project_config_dir() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let mut dir = cwd.parent()?.to_path_buf();
    loop {
        if CONFIG_BASENAMES.iter().any(|name| dir.join(name).is_file()) {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Deep-merge `overlay` into `base`. Objects merge recursively; everything
/// else replaces wholesale.
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Set a dotted path inside a JSON tree, creating objects along the way.
fn set_path(root: &mut serde_json::Value, path: &[String], value: serde_json::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    let serde_json::Value::Object(map) = root else {
        return;
    };

    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }

    let slot = map
        .entry(first.clone())
        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if !slot.is_object() {
        *slot = serde_json::Value::Object(serde_json::Map::new());
    }
    set_path(slot, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_values_is_deep() {
        let mut base = serde_json::json!({
            "indexing": {"file_batch_size": 32, "include_hidden": false},
            "chunker": {"max_chunk_tokens": 512}
        });
        merge_values(
            &mut base,
            serde_json::json!({"indexing": {"file_batch_size": 8}}),
        );
        assert_eq!(base["indexing"]["file_batch_size"], 8);
        assert_eq!(base["indexing"]["include_hidden"], false);
        assert_eq!(base["chunker"]["max_chunk_tokens"], 512);
    }

    #[test]
    fn test_set_path_creates_nested_objects() {
        let mut root = serde_json::Value::Object(serde_json::Map::new());
        set_path(
            &mut root,
            &["indexing".to_string(), "file_batch_size".to_string()],
            serde_json::json!(64),
        );
        assert_eq!(root["indexing"]["file_batch_size"], 64);
    }

    #[test]
    fn test_file_source_roundtrip_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codeweaver.toml");
        std::fs::write(
            &path,
            "[indexing]\nfile_batch_size = 7\n\n[chunker]\nmax_chunk_tokens = 256\n",
        )
        .unwrap();

        let source = FileSource::new(&path, 40, "test");
        let value = source.load().unwrap().unwrap();
        assert_eq!(value["indexing"]["file_batch_size"], 7);
        assert_eq!(value["chunker"]["max_chunk_tokens"], 256);
    }

    #[test]
    fn test_missing_file_source_is_skipped() {
        let source = FileSource::new("/nonexistent/codeweaver.toml", 40, "test");
        assert!(source.load().unwrap().is_none());
    }

    #[test]
    fn test_loader_applies_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codeweaver.json");
        std::fs::write(
            &path,
            r#"{"providers": {"vector_store": {"provider": "memory"}}}"#,
        )
        .unwrap();

        let config = ConfigurationLoader::new()
            .add_source(Box::new(FileSource::new(&path, 40, "test")))
            .load()
            .unwrap();

        assert_eq!(
            config
                .providers
                .vector_store
                .as_ref()
                .map(|e| e.provider.as_str()),
            Some("memory")
        );
        // Defaults survive underneath
        assert_eq!(config.indexing.embedding_batch_size, 100);
    }
}
