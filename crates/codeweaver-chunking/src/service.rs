//! Chunking service
//!
//! Orchestrates the strategy chain for a discovered file: pick the highest
//! applicable strategy, fall through on failure or empty output, and
//! guarantee a non-empty chunk stream for non-empty content.

use codeweaver_config::ChunkerConfig;
use codeweaver_grammar::{GrammarRegistry, default_registry};

use crate::chunks::CodeChunk;
use crate::discovery::DiscoveredFile;
use crate::error::ChunkingResult;
use crate::strategies::delimiter::DelimiterChunker;
use crate::strategies::markdown::MarkdownChunker;
use crate::strategies::recursive::RecursiveChunker;
use crate::strategies::semantic::SemanticChunker;
use crate::strategies::{ChunkStrategy, ChunkerKind, DelimiterRegistry, DelimiterRule};
use crate::token_counter::{TokenBudget, TokenCounterRef, default_counter};

/// Produces ordered chunk streams from discovered files.
pub struct ChunkingService {
    registry: &'static GrammarRegistry,
    delimiters: DelimiterRegistry,
    counter: TokenCounterRef,
    budget: TokenBudget,
    recursive_chars: usize,
}

impl ChunkingService {
    /// Service from chunker configuration, using the default grammar
    /// registry.
    pub fn new(config: &ChunkerConfig) -> Self {
        Self::with_registry(config, default_registry())
    }

    /// Service over an explicit grammar registry (tests, embedded use).
    pub fn with_registry(config: &ChunkerConfig, registry: &'static GrammarRegistry) -> Self {
        Self {
            registry,
            delimiters: DelimiterRegistry::new(),
            counter: default_counter(config.max_chunk_tokens),
            budget: TokenBudget::new(config.max_chunk_tokens, config.overlap_tokens),
            recursive_chars: config.recursive_chunk_chars,
        }
    }

    /// Register a user delimiter rule (feeds the USER_DELIMITER strategy).
    pub fn register_delimiter_rule(&self, rule: DelimiterRule) {
        self.delimiters.register_rule(rule);
    }

    fn run_strategy(
        &self,
        kind: ChunkerKind,
        file: &DiscoveredFile,
        content: &str,
    ) -> ChunkingResult<Vec<CodeChunk>> {
        match kind {
            ChunkerKind::Semantic => {
                SemanticChunker::new(self.registry, self.counter.clone(), self.budget)
                    .chunk(file, content)
            }
            ChunkerKind::UserDelimiter => {
                let Some(language) = file.ext_kind.language else {
                    return Ok(Vec::new());
                };
                DelimiterChunker::new(self.delimiters.prefixes_for(language)).chunk(file, content)
            }
            ChunkerKind::BuiltinDelimiter => {
                let Some(language) = file.ext_kind.language else {
                    return Ok(Vec::new());
                };
                DelimiterChunker::builtin(language).chunk(file, content)
            }
            ChunkerKind::Markdown => MarkdownChunker::new().chunk(file, content),
            ChunkerKind::Recursive => {
                RecursiveChunker::new(self.recursive_chars).chunk(file, content)
            }
        }
    }

    /// Chunk a file's content.
    ///
    /// Empty content yields an empty stream; non-empty content always
    /// yields at least one chunk. Chunks come back ordered by start line.
    ///
    /// # Errors
    ///
    /// Only the recursive splitter's span construction can fail, and only
    /// on internal accounting bugs; strategy errors fall through the chain.
    pub fn chunk_file(
        &self,
        file: &DiscoveredFile,
        content: &str,
    ) -> ChunkingResult<Vec<CodeChunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let mut kind = ChunkerKind::for_language(file.ext_kind.language, &file.path);

        loop {
            match self.run_strategy(kind, file, content) {
                Ok(chunks) if !chunks.is_empty() => {
                    let mut chunks = chunks;
                    chunks.sort_by_key(|c| c.line_range.start_line);
                    return Ok(chunks);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        file = %file.path.display(),
                        strategy = ?kind,
                        "Chunking strategy failed, falling through: {e}"
                    );
                }
            }

            match kind.next_chunker() {
                Some(next) => kind = next,
                None => return Ok(Vec::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::ChunkSource;
    use codeweaver_grammar::SemanticSearchLanguage;

    fn service() -> ChunkingService {
        ChunkingService::new(&ChunkerConfig::default())
    }

    #[test]
    fn test_rust_file_gets_semantic_chunks() {
        let content = "fn a() {}\n\nfn b() {}\n";
        let file = DiscoveredFile::from_content("src/lib.rs", content.as_bytes());
        let chunks = service().chunk_file(&file, content).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.source == ChunkSource::SemanticAst));
    }

    #[test]
    fn test_markdown_file_gets_sections() {
        let content = "# One\ntext\n# Two\nmore";
        let file = DiscoveredFile::from_content("README.md", content.as_bytes());
        let chunks = service().chunk_file(&file, content).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.source == ChunkSource::TextBlock));
    }

    #[test]
    fn test_unknown_file_falls_to_recursive() {
        let content = "opaque line one\nopaque line two";
        let file = DiscoveredFile::from_content("data.unknown", content.as_bytes());
        let chunks = service().chunk_file(&file, content).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, ChunkSource::Recursive);
    }

    #[test]
    fn test_empty_file_yields_empty_stream() {
        let file = DiscoveredFile::from_content("src/empty.rs", b"");
        let chunks = service().chunk_file(&file, "").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_nonempty_always_produces_chunks() {
        // Syntactically broken rust still produces output via fallback
        let content = "fn broken( {{{{";
        let file = DiscoveredFile::from_content("src/broken.rs", content.as_bytes());
        let chunks = service().chunk_file(&file, content).unwrap();
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_chunks_are_ordered_by_start_line() {
        let content = "fn a() {}\n\nfn b() {}\n\nfn c() {}\n";
        let file = DiscoveredFile::from_content("src/lib.rs", content.as_bytes());
        let chunks = service().chunk_file(&file, content).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[0].line_range.start_line <= pair[1].line_range.start_line);
        }
    }

    #[test]
    fn test_user_delimiter_rule_applies_after_semantic_misses() {
        let service = service();
        service.register_delimiter_rule(DelimiterRule {
            language: SemanticSearchLanguage::Sql,
            line_prefix: "-- cut".to_string(),
        });
        // SQL parse may or may not succeed; either way chunks come back
        let content = "select 1;\n-- cut\nselect 2;";
        let file = DiscoveredFile::from_content("q.sql", content.as_bytes());
        let chunks = service.chunk_file(&file, content).unwrap();
        assert!(!chunks.is_empty());
    }
}
