//! Discovered files
//!
//! A [`DiscoveredFile`] is the walker's output: path, size, content hash,
//! and resolved kind. Immutable once constructed; its hash is the key into
//! the file-metadata stores.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use codeweaver_common::hash::{ContentHash, blake_hash, blake_hash_file};
use codeweaver_grammar::ExtKind;

/// A file surfaced by discovery, ready for the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    /// Path as discovered (project-relative in the indexer, absolute in
    /// ad-hoc use)
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// BLAKE3-256 of the file bytes
    pub content_hash: ContentHash,
    /// The `(language, category)` resolution for the path
    pub ext_kind: ExtKind,
    /// Stable identifier for spans referring to this file
    pub source_id: Uuid,
}

impl DiscoveredFile {
    /// Read and hash a file on disk.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let content_hash = blake_hash_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            content_hash,
            ext_kind: ExtKind::from_path(path),
            source_id: Uuid::now_v7(),
        })
    }

    /// Build from in-memory content. Used when the caller already holds the
    /// bytes (search-result reconstruction, tests).
    pub fn from_content(path: impl Into<PathBuf>, content: &[u8]) -> Self {
        let path = path.into();
        Self {
            size: content.len() as u64,
            content_hash: blake_hash(content),
            ext_kind: ExtKind::from_path(&path),
            source_id: Uuid::now_v7(),
            path,
        }
    }

    /// The file name portion of the path, for summaries.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_grammar::SemanticSearchLanguage;
    use std::io::Write;

    #[test]
    fn test_from_path_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "def f():\n    pass\n").unwrap();

        let discovered = DiscoveredFile::from_path(&path).unwrap();
        assert_eq!(discovered.size, 18);
        assert_eq!(
            discovered.content_hash,
            blake_hash(b"def f():\n    pass\n")
        );
        assert_eq!(
            discovered.ext_kind.language,
            Some(SemanticSearchLanguage::Python)
        );
    }

    #[test]
    fn test_from_content_matches_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.rs");
        std::fs::write(&path, "fn main() {}").unwrap();

        let on_disk = DiscoveredFile::from_path(&path).unwrap();
        let in_memory = DiscoveredFile::from_content(&path, b"fn main() {}");
        assert_eq!(on_disk.content_hash, in_memory.content_hash);
        assert_eq!(on_disk.size, in_memory.size);
    }

    #[test]
    fn test_file_name() {
        let file = DiscoveredFile::from_content("src/deep/nested.rs", b"x");
        assert_eq!(file.file_name(), "nested.rs");
    }
}
