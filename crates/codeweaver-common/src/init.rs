//! Process environment bootstrap

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static ENV_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Load environment variables from the nearest `.env` file, once per
/// process.
///
/// Called by configuration loading before environment overrides are read,
/// so env-file values take their documented place in the precedence:
/// above config files, below variables already set in the real
/// environment (existing variables are never overwritten).
///
/// Returns the path of the file that was loaded, if one was found.
pub fn initialize_environment() -> Option<&'static Path> {
    ENV_FILE
        .get_or_init(|| match dotenvy::dotenv() {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Loaded env file");
                Some(path)
            }
            Err(_) => None,
        })
        .as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        // Whatever the first call found, later calls report the same.
        let first = initialize_environment();
        let second = initialize_environment();
        assert_eq!(first, second);
    }
}
