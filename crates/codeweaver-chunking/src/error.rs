//! Error types for the codeweaver-chunking crate

use thiserror::Error;

/// Result type alias for chunking operations
pub type ChunkingResult<T> = Result<T, ChunkingError>;

/// Errors raised while validating shared types or producing chunks
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// A span failed its line-range invariant
    #[error("Invalid span: start {start} to end {end} (lines are 1-based, start <= end)")]
    InvalidSpan { start: usize, end: usize },

    /// A sparse vector failed its shape invariants
    #[error("Invalid sparse vector: {0}")]
    InvalidSparseVector(String),

    /// Tree-sitter failed to produce a parse tree
    #[error("Parse failed for {file}: {reason}")]
    ParseFailed { file: String, reason: String },

    /// Tree-sitter rejected the grammar for a language
    #[error("Grammar setup failed: {0}")]
    GrammarSetup(String),

    /// The strategy chain was exhausted without producing chunks
    #[error("No chunking strategy produced output for {0}")]
    StrategyExhausted(String),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("Chunking error: {0}")]
    Other(String),
}
