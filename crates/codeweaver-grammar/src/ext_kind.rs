//! File kind resolution
//!
//! An [`ExtKind`] is the `(language, category)` pair a file resolves to.
//! It is immutable once constructed and travels with discovered files and
//! chunks so downstream stages never re-derive it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::language::{ConfigLanguage, SemanticSearchLanguage};

/// Broad file category used for filtering and response shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    /// Source code in a supported language
    Code,
    /// Configuration (build files, lockfiles, service config)
    Config,
    /// Documentation (markdown, restructured text, plain text)
    Docs,
    /// Anything else worth indexing as plain text
    Other,
}

/// The `(language, category)` pair a file extension resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtKind {
    /// The semantic-search language, when the grammar set covers the file
    pub language: Option<SemanticSearchLanguage>,
    /// Category, always present
    pub category: FileCategory,
}

/// Documentation extensions treated as text blocks.
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "rst", "adoc", "txt", "text"];

impl ExtKind {
    /// Kind for a known language.
    pub fn from_language(language: SemanticSearchLanguage) -> Self {
        let category = if language.is_config_language() {
            FileCategory::Config
        } else {
            FileCategory::Code
        };
        Self {
            language: Some(language),
            category,
        }
    }

    /// Plain-text kind with an explicit category.
    pub fn text(category: FileCategory) -> Self {
        Self {
            language: None,
            category,
        }
    }

    /// Resolve a file path through the identification chain.
    ///
    /// Config-file recognizers run before the extension fallback so
    /// `Cargo.toml` classifies as Rust config rather than generic TOML.
    pub fn from_path(path: &Path) -> Self {
        if let Some(language) = SemanticSearchLanguage::from_config_file(path) {
            return Self {
                language: Some(language),
                category: FileCategory::Config,
            };
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some(ext) => Self::from_extension(ext),
            None => Self::text(FileCategory::Other),
        }
    }

    /// Resolve from an extension alone.
    pub fn from_extension(ext: &str) -> Self {
        if let Some(language) = SemanticSearchLanguage::from_extension(ext) {
            return Self::from_language(language);
        }
        if ConfigLanguage::from_extension(ext).is_some() {
            return Self::text(FileCategory::Config);
        }
        if DOC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return Self::text(FileCategory::Docs);
        }
        Self::text(FileCategory::Other)
    }

    /// Whether the file has a parseable grammar.
    pub fn is_semantic(self) -> bool {
        self.language.is_some()
    }

    /// Whether the file counts as markdown for the special-case splitter.
    pub fn is_markdown(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md" | "markdown" | "mdx")
        )
    }
}
