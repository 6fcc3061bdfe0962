//! The index file manifest
//!
//! Persisted record of which files are indexed, with which hashes and chunk
//! ids, and which embedding kinds each file carries. Serialized as a single
//! JSON document and written atomically (temp + rename). Entries are keyed
//! by project-relative path in a sorted map so two runs over identical
//! state serialize identically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use codeweaver_chunking::DiscoveredFile;
use codeweaver_common::hash::ContentHash;

use crate::error::{IndexingError, IndexingResult};

/// Manifest schema version; bump on breaking layout changes.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Per-file manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// BLAKE3-256 of the file bytes, hex
    pub content_hash: ContentHash,
    /// Chunk ids in line order
    pub chunk_ids: Vec<Uuid>,
    /// Dense embedding provenance
    #[serde(default)]
    pub dense_embedding_provider: Option<String>,
    #[serde(default)]
    pub dense_embedding_model: Option<String>,
    /// Sparse embedding provenance
    #[serde(default)]
    pub sparse_embedding_provider: Option<String>,
    #[serde(default)]
    pub sparse_embedding_model: Option<String>,
    /// Whether every chunk carries a dense embedding
    #[serde(default)]
    pub has_dense_embeddings: bool,
    /// Whether every chunk carries a sparse embedding
    #[serde(default)]
    pub has_sparse_embeddings: bool,
    /// Number of chunks (redundant with `chunk_ids.len()`, kept for quick
    /// stats without deserializing the id list)
    pub chunk_count: usize,
}

/// How a discovered file relates to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    New,
    Modified,
    Unchanged,
}

/// The manifest diff for one discovery pass.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub new: Vec<DiscoveredFile>,
    pub modified: Vec<DiscoveredFile>,
    pub unchanged: Vec<DiscoveredFile>,
    /// Paths present in the manifest but missing on disk
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    /// Files that need (re-)indexing, deletions excluded.
    pub fn to_index(&self) -> impl Iterator<Item = &DiscoveredFile> {
        self.new.iter().chain(self.modified.iter())
    }
}

/// The persisted manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFileManifest {
    pub schema_version: u32,
    pub project_path: PathBuf,
    pub total_files: usize,
    pub total_chunks: usize,
    /// relative path -> entry, sorted for stable serialization
    pub files: BTreeMap<String, FileEntry>,
}

impl IndexFileManifest {
    /// Empty manifest for a project.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            project_path: project_path.into(),
            total_files: 0,
            total_chunks: 0,
            files: BTreeMap::new(),
        }
    }

    fn key_for(path: &Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }

    /// Record (or replace) a file's entry and refresh the totals.
    #[allow(clippy::too_many_arguments)]
    pub fn add_file(
        &mut self,
        relative_path: &Path,
        content_hash: ContentHash,
        chunk_ids: Vec<Uuid>,
        dense_embedding_provider: Option<String>,
        dense_embedding_model: Option<String>,
        sparse_embedding_provider: Option<String>,
        sparse_embedding_model: Option<String>,
        has_dense_embeddings: bool,
        has_sparse_embeddings: bool,
    ) {
        let chunk_count = chunk_ids.len();
        self.files.insert(
            Self::key_for(relative_path),
            FileEntry {
                content_hash,
                chunk_ids,
                dense_embedding_provider,
                dense_embedding_model,
                sparse_embedding_provider,
                sparse_embedding_model,
                has_dense_embeddings,
                has_sparse_embeddings,
                chunk_count,
            },
        );
        self.recompute_totals();
    }

    /// Remove a file's entry, returning it.
    pub fn remove_file(&mut self, relative_path: &Path) -> Option<FileEntry> {
        let removed = self.files.remove(&Self::key_for(relative_path));
        if removed.is_some() {
            self.recompute_totals();
        }
        removed
    }

    /// Look up a file's entry.
    pub fn get(&self, relative_path: &Path) -> Option<&FileEntry> {
        self.files.get(&Self::key_for(relative_path))
    }

    /// Mutable entry access (reconciliation updates flags in place).
    pub fn get_mut(&mut self, relative_path: &Path) -> Option<&mut FileEntry> {
        self.files.get_mut(&Self::key_for(relative_path))
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn recompute_totals(&mut self) {
        self.total_files = self.files.len();
        self.total_chunks = self.files.values().map(|e| e.chunk_count).sum();
    }

    /// Classify one discovered file against the manifest.
    pub fn classify(&self, relative_path: &Path, content_hash: &ContentHash) -> FileChangeKind {
        match self.get(relative_path) {
            None => FileChangeKind::New,
            Some(entry) if entry.content_hash == *content_hash => FileChangeKind::Unchanged,
            Some(_) => FileChangeKind::Modified,
        }
    }

    /// Diff a full discovery pass against the manifest. `discovered` paths
    /// must already be project-relative.
    pub fn diff(&self, discovered: Vec<DiscoveredFile>) -> ChangeSet {
        let mut change_set = ChangeSet::default();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

        for file in discovered {
            seen.insert(Self::key_for(&file.path));
            match self.classify(&file.path, &file.content_hash) {
                FileChangeKind::New => change_set.new.push(file),
                FileChangeKind::Modified => change_set.modified.push(file),
                FileChangeKind::Unchanged => change_set.unchanged.push(file),
            }
        }

        for path in self.files.keys() {
            if !seen.contains(path) {
                change_set.deleted.push(PathBuf::from(path));
            }
        }

        change_set
    }

    /// Relative paths whose entries lack the requested embedding kinds.
    pub fn files_missing_embeddings(&self, want_dense: bool, want_sparse: bool) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|(_, entry)| {
                (want_dense && !entry.has_dense_embeddings)
                    || (want_sparse && !entry.has_sparse_embeddings)
            })
            .map(|(path, _)| PathBuf::from(path))
            .collect()
    }
}

/// Loads and saves the manifest document atomically.
pub struct FileManifestManager {
    path: PathBuf,
}

impl FileManifestManager {
    /// Manager for `<cache_dir>/<project>_index.json`.
    pub fn new(cache_dir: &Path, project_path: &Path) -> Self {
        let project = project_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Self {
            path: cache_dir.join(format!("{project}_index.json")),
        }
    }

    /// Manager with an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The manifest file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, if one exists and parses.
    pub fn load(&self) -> Option<IndexFileManifest> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Manifest unreadable, starting fresh: {e}");
                None
            }
        }
    }

    /// Save the manifest atomically (temp + rename).
    ///
    /// # Errors
    ///
    /// Returns [`IndexingError::ManifestWrite`] on any failure - this is
    /// the fatal error class.
    pub fn save(&self, manifest: &IndexFileManifest) -> IndexingResult<()> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| IndexingError::ManifestWrite(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexingError::ManifestWrite(e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| IndexingError::ManifestWrite(e.to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| IndexingError::ManifestWrite(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_common::hash::blake_hash;

    fn entry_args() -> (ContentHash, Vec<Uuid>) {
        (blake_hash(b"content"), vec![Uuid::now_v7(), Uuid::now_v7()])
    }

    #[test]
    fn test_add_and_totals() {
        let mut manifest = IndexFileManifest::new("/project");
        let (hash, ids) = entry_args();
        manifest.add_file(
            Path::new("src/a.rs"),
            hash,
            ids,
            Some("mock-embedding".to_string()),
            Some("mock-dense-768".to_string()),
            None,
            None,
            true,
            false,
        );
        assert_eq!(manifest.total_files, 1);
        assert_eq!(manifest.total_chunks, 2);
        let entry = manifest.get(Path::new("src/a.rs")).unwrap();
        assert!(entry.has_dense_embeddings);
        assert!(!entry.has_sparse_embeddings);
    }

    #[test]
    fn test_classify() {
        let mut manifest = IndexFileManifest::new("/project");
        let hash = blake_hash(b"v1");
        manifest.add_file(
            Path::new("a.py"),
            hash.clone(),
            vec![Uuid::now_v7()],
            None,
            None,
            None,
            None,
            false,
            false,
        );

        assert_eq!(
            manifest.classify(Path::new("a.py"), &hash),
            FileChangeKind::Unchanged
        );
        assert_eq!(
            manifest.classify(Path::new("a.py"), &blake_hash(b"v2")),
            FileChangeKind::Modified
        );
        assert_eq!(
            manifest.classify(Path::new("b.py"), &hash),
            FileChangeKind::New
        );
    }

    #[test]
    fn test_diff_detects_deletions() {
        let mut manifest = IndexFileManifest::new("/project");
        manifest.add_file(
            Path::new("gone.rs"),
            blake_hash(b"old"),
            vec![Uuid::now_v7()],
            None,
            None,
            None,
            None,
            false,
            false,
        );

        let discovered = vec![DiscoveredFile::from_content("new.rs", b"fn n() {}")];
        let change_set = manifest.diff(discovered);
        assert_eq!(change_set.new.len(), 1);
        assert_eq!(change_set.deleted, vec![PathBuf::from("gone.rs")]);
        assert!(change_set.modified.is_empty());
    }

    #[test]
    fn test_missing_embeddings_selection() {
        let mut manifest = IndexFileManifest::new("/project");
        manifest.add_file(
            Path::new("dense_only.rs"),
            blake_hash(b"a"),
            vec![Uuid::now_v7()],
            Some("voyage".to_string()),
            Some("voyage-3".to_string()),
            None,
            None,
            true,
            false,
        );
        manifest.add_file(
            Path::new("complete.rs"),
            blake_hash(b"b"),
            vec![Uuid::now_v7()],
            Some("voyage".to_string()),
            Some("voyage-3".to_string()),
            Some("splade".to_string()),
            Some("splade-v3".to_string()),
            true,
            true,
        );

        let missing_sparse = manifest.files_missing_embeddings(false, true);
        assert_eq!(missing_sparse, vec![PathBuf::from("dense_only.rs")]);
        assert!(manifest.files_missing_embeddings(true, false).is_empty());
    }

    #[test]
    fn test_manifest_roundtrip() {
        let mut manifest = IndexFileManifest::new("/project");
        let (hash, ids) = entry_args();
        manifest.add_file(
            Path::new("src/lib.rs"),
            hash,
            ids,
            Some("mock-embedding".to_string()),
            Some("mock-dense-768".to_string()),
            Some("mock-sparse-embedding".to_string()),
            Some("mock-sparse-bow".to_string()),
            true,
            true,
        );

        let dir = tempfile::tempdir().unwrap();
        let manager = FileManifestManager::at_path(dir.path().join("m.json"));
        manager.save(&manifest).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_manager_path_shape() {
        let manager =
            FileManifestManager::new(Path::new("/cache"), Path::new("/home/dev/myproject"));
        assert_eq!(
            manager.path(),
            Path::new("/cache/myproject_index.json")
        );
    }
}
