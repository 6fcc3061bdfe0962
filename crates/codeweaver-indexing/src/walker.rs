//! File discovery
//!
//! Gitignore-aware walking with user include/exclude globs, hidden-file
//! policy, default exclusions for build artifacts and lockfiles, size caps,
//! and forced inclusion of tooling directories. Tooling directories
//! (`.github`, `.circleci`, agent config dirs) override the hidden-file
//! filter but never `.gitignore`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use codeweaver_config::IndexingConfig;

use crate::error::{IndexingError, IndexingResult};

/// Directory names always skipped (build artifacts, package caches).
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "dist",
    "build",
    "out",
    "__pycache__",
    ".venv",
    "venv",
    ".git",
];

/// File name suffixes always skipped (lockfiles, minified bundles).
const DEFAULT_EXCLUDED_SUFFIXES: &[&str] = &[".lock", ".min.js", ".min.css", ".map"];

/// Tooling directories force-included when enabled.
const TOOLING_DIRS: &[&str] = &[".github", ".circleci", ".claude", ".cursor", ".codeweaver"];

/// Configurable project walker.
pub struct FileWalker {
    root: PathBuf,
    config: IndexingConfig,
}

impl FileWalker {
    /// Walker over a project root.
    pub fn new(root: impl Into<PathBuf>, config: IndexingConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn is_default_excluded(path: &Path) -> bool {
        let in_excluded_dir = path.iter().any(|component| {
            component
                .to_str()
                .is_some_and(|name| DEFAULT_EXCLUDED_DIRS.contains(&name))
        });
        if in_excluded_dir {
            return true;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                DEFAULT_EXCLUDED_SUFFIXES
                    .iter()
                    .any(|suffix| name.ends_with(suffix))
            })
    }

    fn overrides(&self) -> IndexingResult<Option<ignore::overrides::Override>> {
        if self.config.include_globs.is_empty() && self.config.exclude_globs.is_empty() {
            return Ok(None);
        }
        let mut builder = OverrideBuilder::new(&self.root);
        for glob in &self.config.include_globs {
            builder
                .add(glob)
                .map_err(|e| IndexingError::Configuration(format!("Bad include glob: {e}")))?;
        }
        for glob in &self.config.exclude_globs {
            builder
                .add(&format!("!{glob}"))
                .map_err(|e| IndexingError::Configuration(format!("Bad exclude glob: {e}")))?;
        }
        let overrides = builder
            .build()
            .map_err(|e| IndexingError::Configuration(format!("Glob set invalid: {e}")))?;
        Ok(Some(overrides))
    }

    fn collect_from(
        &self,
        start: &Path,
        show_hidden: bool,
        paths: &mut BTreeSet<PathBuf>,
    ) -> IndexingResult<()> {
        let mut builder = WalkBuilder::new(start);
        builder
            .hidden(!show_hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false);
        if let Some(overrides) = self.overrides()? {
            builder.overrides(overrides);
        }

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Walk entry error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if Self::is_default_excluded(path) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.len() > self.config.max_file_size_bytes {
                    tracing::debug!(
                        path = %path.display(),
                        size = metadata.len(),
                        "Skipping oversized file"
                    );
                    continue;
                }
            }
            paths.insert(path.to_path_buf());
        }
        Ok(())
    }

    /// Walk the project and return the discovered file paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns configuration errors for malformed globs; per-entry walk
    /// errors are logged and skipped.
    pub fn walk(&self) -> IndexingResult<Vec<PathBuf>> {
        let mut paths = BTreeSet::new();
        self.collect_from(&self.root, self.config.include_hidden, &mut paths)?;

        // Tooling directories bypass the hidden filter but not .gitignore:
        // each gets its own pass with hidden files visible.
        if self.config.include_tooling_dirs && !self.config.include_hidden {
            for dir_name in TOOLING_DIRS {
                let dir = self.root.join(dir_name);
                if dir.is_dir() {
                    self.collect_from(&dir, true, &mut paths)?;
                }
            }
        }

        Ok(paths.into_iter().collect())
    }

    /// Walk and relativize against the project root.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::walk`].
    pub fn walk_relative(&self) -> IndexingResult<Vec<PathBuf>> {
        Ok(self
            .walk()?
            .into_iter()
            .map(|path| {
                path.strip_prefix(&self.root)
                    .map(Path::to_path_buf)
                    .unwrap_or(path)
            })
            .collect())
    }
}
