//! Chunking strategy chain
//!
//! Strategies are ordered by precedence. `for_language` picks the highest
//! applicable strategy for a file; when a strategy fails or produces
//! nothing, the service falls through `next_chunker` until the recursive
//! splitter, which always yields at least one chunk for non-empty input.

pub mod delimiter;
pub mod markdown;
pub mod recursive;
pub mod semantic;

use std::path::Path;

use codeweaver_grammar::{ExtKind, SemanticSearchLanguage};

use crate::chunks::CodeChunk;
use crate::discovery::DiscoveredFile;
use crate::error::ChunkingResult;

pub use delimiter::{DelimiterRegistry, DelimiterRule};

/// A chunk-producing strategy.
pub trait ChunkStrategy: Send + Sync {
    /// Produce ordered chunks for a file's content.
    ///
    /// # Errors
    ///
    /// Strategy-specific failures (parse errors, grammar setup); the
    /// service treats any error as a fall-through to the next strategy.
    fn chunk(&self, file: &DiscoveredFile, content: &str) -> ChunkingResult<Vec<CodeChunk>>;
}

/// Strategy identifiers, in precedence order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkerKind {
    /// Tree-sitter AST walk
    Semantic,
    /// User-registered delimiter rules
    UserDelimiter,
    /// Built-in delimiter families
    BuiltinDelimiter,
    /// Markdown section splitter
    Markdown,
    /// Last-resort recursive character splitter
    Recursive,
}

impl ChunkerKind {
    /// Pick the highest-precedence applicable strategy for a file.
    ///
    /// Every supported language has a grammar, so a resolved language
    /// always starts at SEMANTIC; delimiter strategies are reached through
    /// the fallback chain when the parse produces nothing usable.
    pub fn for_language(language: Option<SemanticSearchLanguage>, path: &Path) -> Self {
        if language.is_some() {
            return Self::Semantic;
        }
        if ExtKind::is_markdown(path) {
            return Self::Markdown;
        }
        Self::Recursive
    }

    /// The next strategy to try after this one fails.
    pub fn next_chunker(self) -> Option<Self> {
        match self {
            Self::Semantic => Some(Self::UserDelimiter),
            Self::UserDelimiter => Some(Self::BuiltinDelimiter),
            Self::BuiltinDelimiter => Some(Self::Markdown),
            Self::Markdown => Some(Self::Recursive),
            Self::Recursive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_language_selects_semantic() {
        assert_eq!(
            ChunkerKind::for_language(Some(SemanticSearchLanguage::Rust), &PathBuf::from("a.rs")),
            ChunkerKind::Semantic
        );
    }

    #[test]
    fn test_markdown_selects_markdown() {
        assert_eq!(
            ChunkerKind::for_language(None, &PathBuf::from("README.md")),
            ChunkerKind::Markdown
        );
    }

    #[test]
    fn test_unknown_selects_recursive() {
        assert_eq!(
            ChunkerKind::for_language(None, &PathBuf::from("data.bin")),
            ChunkerKind::Recursive
        );
    }

    #[test]
    fn test_fallback_chain_terminates_at_recursive() {
        let mut kind = ChunkerKind::Semantic;
        let mut hops = 0;
        while let Some(next) = kind.next_chunker() {
            kind = next;
            hops += 1;
        }
        assert_eq!(kind, ChunkerKind::Recursive);
        assert_eq!(hops, 4);
    }
}
