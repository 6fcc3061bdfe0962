//! Delimiter-based chunking
//!
//! Two strategies share this module: user-registered delimiter rules and
//! the built-in delimiter families. Both split a file at lines starting
//! with a delimiter prefix; each segment becomes one chunk.

use std::collections::HashMap;
use std::sync::RwLock;

use codeweaver_grammar::SemanticSearchLanguage;

use crate::chunks::{ChunkSource, CodeChunk};
use crate::discovery::DiscoveredFile;
use crate::error::ChunkingResult;
use crate::spans::Span;
use crate::strategies::ChunkStrategy;

/// A delimiter rule: lines starting with `line_prefix` (after leading
/// whitespace is trimmed) open a new chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterRule {
    pub language: SemanticSearchLanguage,
    pub line_prefix: String,
}

/// Built-in delimiter families keyed by language.
///
/// These cover languages whose grammar pass can fail (or that read better
/// split on idiomatic section markers) without user configuration.
pub fn builtin_rules(language: SemanticSearchLanguage) -> &'static [&'static str] {
    match language {
        SemanticSearchLanguage::Bash => &["function ", "#!"],
        SemanticSearchLanguage::PowerShell => &["function ", "filter "],
        SemanticSearchLanguage::Sql => &[
            "create ",
            "CREATE ",
            "alter ",
            "ALTER ",
            "insert ",
            "INSERT ",
        ],
        SemanticSearchLanguage::Yaml => &["---"],
        _ => &[],
    }
}

/// Registry of user delimiter rules.
///
/// `register_rule` is the single public registration entry point feeding
/// the USER_DELIMITER strategy.
#[derive(Default)]
pub struct DelimiterRegistry {
    rules: RwLock<HashMap<SemanticSearchLanguage, Vec<DelimiterRule>>>,
}

impl DelimiterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user delimiter rule for a language.
    pub fn register_rule(&self, rule: DelimiterRule) {
        if let Ok(mut rules) = self.rules.write() {
            let entry = rules.entry(rule.language).or_default();
            if !entry.contains(&rule) {
                entry.push(rule);
            }
        }
    }

    /// Whether a language has user rules.
    pub fn has_user_rules(&self, language: SemanticSearchLanguage) -> bool {
        self.rules
            .read()
            .map(|rules| rules.get(&language).is_some_and(|r| !r.is_empty()))
            .unwrap_or(false)
    }

    /// The user rule prefixes for a language.
    pub fn prefixes_for(&self, language: SemanticSearchLanguage) -> Vec<String> {
        self.rules
            .read()
            .map(|rules| {
                rules
                    .get(&language)
                    .map(|r| r.iter().map(|rule| rule.line_prefix.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

/// Splits content at delimiter prefixes.
pub struct DelimiterChunker {
    prefixes: Vec<String>,
}

impl DelimiterChunker {
    /// Chunker over a fixed prefix list.
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Chunker over a language's built-in family.
    pub fn builtin(language: SemanticSearchLanguage) -> Self {
        Self {
            prefixes: builtin_rules(language)
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }

    fn is_delimiter(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        self.prefixes.iter().any(|p| trimmed.starts_with(p))
    }
}

impl ChunkStrategy for DelimiterChunker {
    fn chunk(&self, file: &DiscoveredFile, content: &str) -> ChunkingResult<Vec<CodeChunk>> {
        if content.is_empty() || self.prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut boundaries: Vec<usize> = vec![0];
        for (idx, line) in lines.iter().enumerate().skip(1) {
            if self.is_delimiter(line) {
                boundaries.push(idx);
            }
        }
        boundaries.push(lines.len());

        let mut chunks = Vec::new();
        for window in boundaries.windows(2) {
            let (start, end) = (window[0], window[1]);
            if start >= end {
                continue;
            }
            let segment = lines[start..end].join("\n");
            if segment.trim().is_empty() {
                continue;
            }
            let span = Span::new(start + 1, end, file.source_id)?;
            chunks.push(CodeChunk::new(
                segment,
                span,
                file.path.clone(),
                file.ext_kind,
                ChunkSource::Delimiter,
            ));
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bash_split() {
        let content = "#!/bin/sh\necho hi\nfunction greet() {\n  echo hello\n}\nfunction bye() {\n  echo bye\n}";
        let file = DiscoveredFile::from_content("run.sh", content.as_bytes());
        let chunks = DelimiterChunker::builtin(SemanticSearchLanguage::Bash)
            .chunk(&file, content)
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].line_range.start_line, 3);
        assert!(chunks[1].content.starts_with("function greet"));
        assert!(chunks.iter().all(|c| c.source == ChunkSource::Delimiter));
    }

    #[test]
    fn test_no_delimiters_single_chunk() {
        let content = "echo one\necho two";
        let file = DiscoveredFile::from_content("run.sh", content.as_bytes());
        let chunks = DelimiterChunker::builtin(SemanticSearchLanguage::Bash)
            .chunk(&file, content)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line_range.start_line, 1);
        assert_eq!(chunks[0].line_range.end_line, 2);
    }

    #[test]
    fn test_registry_register_and_query() {
        let registry = DelimiterRegistry::new();
        assert!(!registry.has_user_rules(SemanticSearchLanguage::Sql));

        registry.register_rule(DelimiterRule {
            language: SemanticSearchLanguage::Sql,
            line_prefix: "-- section:".to_string(),
        });
        assert!(registry.has_user_rules(SemanticSearchLanguage::Sql));
        assert_eq!(
            registry.prefixes_for(SemanticSearchLanguage::Sql),
            vec!["-- section:".to_string()]
        );

        // Duplicate registration collapses
        registry.register_rule(DelimiterRule {
            language: SemanticSearchLanguage::Sql,
            line_prefix: "-- section:".to_string(),
        });
        assert_eq!(registry.prefixes_for(SemanticSearchLanguage::Sql).len(), 1);
    }

    #[test]
    fn test_user_rules_drive_chunker() {
        let registry = DelimiterRegistry::new();
        registry.register_rule(DelimiterRule {
            language: SemanticSearchLanguage::Sql,
            line_prefix: "-- section:".to_string(),
        });

        let content = "select 1;\n-- section: two\nselect 2;";
        let file = DiscoveredFile::from_content("q.sql", content.as_bytes());
        let chunker = DelimiterChunker::new(registry.prefixes_for(SemanticSearchLanguage::Sql));
        let chunks = chunker.chunk(&file, content).unwrap();
        assert_eq!(chunks.len(), 2);
    }
}
