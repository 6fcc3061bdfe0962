//! Configuration validation framework

use regex::Regex;

use crate::{CodeWeaverConfig, ConfigError, ConfigResult};

/// Get URL validation regex - returns None if regex compilation fails
fn get_url_regex() -> Option<&'static Regex> {
    static URL_REGEX: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    URL_REGEX
        .get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").ok())
        .as_ref()
}

/// Trait for validating configuration values
pub trait Validate {
    /// Validate this configuration object
    ///
    /// # Errors
    /// Returns validation errors if the configuration is invalid
    fn validate(&self) -> ConfigResult<()>;
}

/// Validate a URL string
///
/// # Errors
/// Returns `ConfigError::InvalidUrl` if the URL format is invalid
pub fn validate_url(url: &str) -> ConfigResult<()> {
    get_url_regex().map_or_else(
        || {
            // Regex compilation failed; basic scheme check
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(())
            } else {
                Err(ConfigError::InvalidUrl {
                    url: url.to_string(),
                })
            }
        },
        |regex| {
            if regex.is_match(url) {
                Ok(())
            } else {
                Err(ConfigError::InvalidUrl {
                    url: url.to_string(),
                })
            }
        },
    )
}

/// Validate a value is within a range
///
/// # Errors
/// Returns `ConfigError::OutOfRange` if value is outside the specified range
pub fn validate_range(value: u64, min: u64, max: u64, field_name: &str) -> ConfigResult<()> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field: field_name.to_string(),
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

impl Validate for CodeWeaverConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.vector_store.url)?;
        validate_range(
            self.vector_store.dimensions as u64,
            1,
            65_536,
            "vector_store.dimensions",
        )?;
        validate_range(
            self.indexing.embedding_batch_size as u64,
            1,
            100,
            "indexing.embedding_batch_size",
        )?;
        validate_range(
            self.indexing.file_batch_size as u64,
            1,
            10_000,
            "indexing.file_batch_size",
        )?;
        validate_range(
            self.chunker.max_chunk_tokens as u64,
            16,
            32_768,
            "chunker.max_chunk_tokens",
        )?;
        validate_range(self.retry.max_attempts as u64, 0, 10, "retry.max_attempts")?;

        if self.chunker.overlap_tokens >= self.chunker.max_chunk_tokens {
            return Err(ConfigError::Generic {
                message: format!(
                    "chunker.overlap_tokens ({}) must be smaller than chunker.max_chunk_tokens ({})",
                    self.chunker.overlap_tokens, self.chunker.max_chunk_tokens
                ),
            });
        }

        for (kind, entry) in [
            ("embedding", &self.providers.embedding),
            ("sparse_embedding", &self.providers.sparse_embedding),
            ("reranking", &self.providers.reranking),
            ("vector_store", &self.providers.vector_store),
        ] {
            if let Some(entry) = entry {
                if entry.provider.trim().is_empty() {
                    return Err(ConfigError::MissingField {
                        field: format!("providers.{kind}.provider"),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderEntry;

    #[test]
    fn test_default_config_validates() {
        assert!(CodeWeaverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_url_rejected() {
        let mut config = CodeWeaverConfig::default();
        config.vector_store.url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_batch_size_over_cap_rejected() {
        let mut config = CodeWeaverConfig::default();
        config.indexing.embedding_batch_size = 500;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_blank_provider_id_rejected() {
        let mut config = CodeWeaverConfig::default();
        config.providers.embedding = Some(ProviderEntry::new("  "));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_overlap_must_fit_budget() {
        let mut config = CodeWeaverConfig::default();
        config.chunker.overlap_tokens = config.chunker.max_chunk_tokens;
        assert!(config.validate().is_err());
    }
}
