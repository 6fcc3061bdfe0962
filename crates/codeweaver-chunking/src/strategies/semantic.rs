//! Semantic AST chunking
//!
//! Walks the tree-sitter parse tree and produces one chunk per top-level
//! node, merging consecutive small nodes while the accumulated text stays
//! under the token budget's soft target. A single node that exceeds the
//! hard limit is split by line windows. Each chunk carries the semantic
//! class of its leading node, resolved through the grammar registry.

use codeweaver_grammar::{GrammarRegistry, SemanticClass, SemanticSearchLanguage};
use tree_sitter::{Node, Parser};

use crate::chunks::{ChunkSource, CodeChunk};
use crate::discovery::DiscoveredFile;
use crate::error::{ChunkingError, ChunkingResult};
use crate::spans::Span;
use crate::strategies::ChunkStrategy;
use crate::token_counter::{TokenBudget, TokenCounterRef};

/// One top-level node's text and position, before budget merging.
struct NodeSpan {
    text: String,
    start_line: usize,
    end_line: usize,
    semantic_class: Option<SemanticClass>,
}

/// Tree-sitter driven chunker.
pub struct SemanticChunker<'r> {
    registry: &'r GrammarRegistry,
    counter: TokenCounterRef,
    budget: TokenBudget,
}

impl<'r> SemanticChunker<'r> {
    /// Chunker over a grammar registry and a token budget.
    pub fn new(registry: &'r GrammarRegistry, counter: TokenCounterRef, budget: TokenBudget) -> Self {
        Self {
            registry,
            counter,
            budget,
        }
    }

    fn classify(&self, node: &Node<'_>, language: SemanticSearchLanguage) -> Option<SemanticClass> {
        self.registry
            .semantic_classes_for(node.kind(), language)
            .into_iter()
            .next()
    }

    fn collect_top_level(
        &self,
        content: &str,
        root: Node<'_>,
        language: SemanticSearchLanguage,
    ) -> Vec<NodeSpan> {
        let mut spans = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let Some(text) = content.get(child.byte_range()) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            spans.push(NodeSpan {
                text: text.to_string(),
                start_line: child.start_position().row + 1,
                end_line: child.end_position().row + 1,
                semantic_class: self.classify(&child, language),
            });
        }
        spans
    }

    fn push_chunk(
        &self,
        file: &DiscoveredFile,
        text: String,
        start_line: usize,
        end_line: usize,
        semantic_class: Option<SemanticClass>,
        chunks: &mut Vec<CodeChunk>,
    ) -> ChunkingResult<()> {
        let span = Span::new(start_line, end_line, file.source_id)?;
        chunks.push(
            CodeChunk::new(
                text,
                span,
                file.path.clone(),
                file.ext_kind,
                ChunkSource::SemanticAst,
            )
            .with_semantic_class(semantic_class),
        );
        Ok(())
    }

    /// Split an over-budget node by line windows, keeping line accounting.
    fn split_large_node(
        &self,
        file: &DiscoveredFile,
        node: &NodeSpan,
        chunks: &mut Vec<CodeChunk>,
    ) -> ChunkingResult<()> {
        let lines: Vec<&str> = node.text.lines().collect();
        let mut window: Vec<&str> = Vec::new();
        let mut window_start = node.start_line;
        let mut window_tokens = 0usize;

        for (offset, line) in lines.iter().enumerate() {
            let line_tokens = self.counter.count(line).max(1);
            if window_tokens + line_tokens > self.budget.hard && !window.is_empty() {
                let end_line = node.start_line + offset - 1;
                self.push_chunk(
                    file,
                    window.join("\n"),
                    window_start,
                    end_line,
                    node.semantic_class,
                    chunks,
                )?;
                window.clear();
                window_start = node.start_line + offset;
                window_tokens = 0;
            }
            window.push(line);
            window_tokens += line_tokens;
        }

        if !window.is_empty() {
            self.push_chunk(
                file,
                window.join("\n"),
                window_start,
                node.end_line,
                node.semantic_class,
                chunks,
            )?;
        }
        Ok(())
    }
}

impl ChunkStrategy for SemanticChunker<'_> {
    fn chunk(&self, file: &DiscoveredFile, content: &str) -> ChunkingResult<Vec<CodeChunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let Some(language) = file.ext_kind.language else {
            return Ok(Vec::new());
        };

        self.registry
            .ensure_language(language)
            .map_err(|e| ChunkingError::GrammarSetup(e.to_string()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&language.tree_sitter_language())
            .map_err(|e| ChunkingError::GrammarSetup(e.to_string()))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ChunkingError::ParseFailed {
                file: file.path.display().to_string(),
                reason: "tree-sitter returned no tree".to_string(),
            })?;

        let node_spans = self.collect_top_level(content, tree.root_node(), language);
        if node_spans.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut acc_text = String::new();
        let mut acc_start = 0usize;
        let mut acc_end = 0usize;
        let mut acc_tokens = 0usize;
        let mut acc_class: Option<SemanticClass> = None;

        for node in node_spans {
            let node_tokens = self.counter.count(&node.text);

            // A single node over the hard limit gets split on its own.
            if node_tokens > self.budget.hard {
                if !acc_text.is_empty() {
                    self.push_chunk(file, acc_text.clone(), acc_start, acc_end, acc_class, &mut chunks)?;
                    acc_text.clear();
                    acc_tokens = 0;
                    acc_class = None;
                }
                self.split_large_node(file, &node, &mut chunks)?;
                continue;
            }

            // Flush when adding this node would cross the soft target.
            if !acc_text.is_empty() && acc_tokens + node_tokens > self.budget.soft {
                self.push_chunk(file, acc_text.clone(), acc_start, acc_end, acc_class, &mut chunks)?;
                acc_text.clear();
                acc_tokens = 0;
                acc_class = None;
            }

            if acc_text.is_empty() {
                acc_start = node.start_line;
                acc_class = node.semantic_class;
            } else {
                acc_text.push_str("\n\n");
            }
            acc_text.push_str(&node.text);
            acc_end = node.end_line;
            acc_tokens += node_tokens;
        }

        if !acc_text.is_empty() {
            self.push_chunk(file, acc_text, acc_start, acc_end, acc_class, &mut chunks)?;
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_counter::HeuristicCounter;
    use std::sync::Arc;

    fn chunker_with_budget(
        registry: &GrammarRegistry,
        max_tokens: usize,
    ) -> SemanticChunker<'_> {
        SemanticChunker::new(
            registry,
            Arc::new(HeuristicCounter::new(max_tokens)),
            TokenBudget::new(max_tokens, 0),
        )
    }

    const RUST_SOURCE: &str = r#"use std::fmt;

fn alpha() -> usize {
    1
}

fn beta() -> usize {
    2
}

struct Gamma {
    value: usize,
}
"#;

    #[test]
    fn test_chunks_rust_source() {
        let registry = GrammarRegistry::new();
        let chunker = chunker_with_budget(&registry, 512);
        let file = DiscoveredFile::from_content("src/lib.rs", RUST_SOURCE.as_bytes());
        let chunks = chunker.chunk(&file, RUST_SOURCE).unwrap();

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.source == ChunkSource::SemanticAst));

        // Chunks are ordered and inside the file
        let total_lines = RUST_SOURCE.lines().count();
        for pair in chunks.windows(2) {
            assert!(pair[0].line_range.start_line <= pair[1].line_range.start_line);
        }
        for chunk in &chunks {
            assert!(chunk.line_range.fits_in_file(total_lines));
        }
    }

    #[test]
    fn test_small_budget_splits_per_item() {
        let registry = GrammarRegistry::new();
        // ~10 tokens forces each item into its own chunk
        let chunker = chunker_with_budget(&registry, 10);
        let file = DiscoveredFile::from_content("src/lib.rs", RUST_SOURCE.as_bytes());
        let chunks = chunker.chunk(&file, RUST_SOURCE).unwrap();
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_semantic_class_attached_to_functions() {
        let registry = GrammarRegistry::new();
        let chunker = chunker_with_budget(&registry, 64);
        let source = "fn solo() -> usize { 42 }\n";
        let file = DiscoveredFile::from_content("src/solo.rs", source.as_bytes());
        let chunks = chunker.chunk(&file, source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].semantic_class,
            Some(SemanticClass::DefinitionCallable)
        );
    }

    #[test]
    fn test_non_semantic_file_yields_nothing() {
        let registry = GrammarRegistry::new();
        let chunker = chunker_with_budget(&registry, 512);
        let file = DiscoveredFile::from_content("notes.txt", b"plain text");
        let chunks = chunker.chunk(&file, "plain text").unwrap();
        assert!(chunks.is_empty());
    }
}
