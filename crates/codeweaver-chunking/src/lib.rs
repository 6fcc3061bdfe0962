//! CodeWeaver chunking crate
//!
//! Shared pipeline types (spans, chunks, discovered files, search results)
//! and the chunking strategy chain that turns a discovered file into an
//! ordered stream of code chunks with semantic classification attached.

pub mod chunks;
pub mod discovery;
pub mod error;
pub mod service;
pub mod spans;
pub mod strategies;
pub mod token_counter;

pub use chunks::{ChunkSource, CodeChunk, SearchResult, SparseVec};
pub use discovery::DiscoveredFile;
pub use error::{ChunkingError, ChunkingResult};
pub use service::ChunkingService;
pub use spans::Span;
pub use strategies::{ChunkerKind, DelimiterRegistry, DelimiterRule};
pub use token_counter::{
    HeuristicCounter, TiktokenCounter, TokenBudget, TokenCounter, TokenCounterRef, default_counter,
};
