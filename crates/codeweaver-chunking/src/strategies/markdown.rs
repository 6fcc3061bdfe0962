//! Markdown section splitter
//!
//! Special-case strategy for markdown: split at ATX headings so each
//! section (heading plus body) becomes one text-block chunk. Fenced code
//! blocks are respected - a `#` inside a fence is content, not a heading.

use crate::chunks::{ChunkSource, CodeChunk};
use crate::discovery::DiscoveredFile;
use crate::error::ChunkingResult;
use crate::spans::Span;
use crate::strategies::ChunkStrategy;

/// Heading-based markdown splitter.
#[derive(Default)]
pub struct MarkdownChunker;

impl MarkdownChunker {
    /// New splitter.
    pub fn new() -> Self {
        Self
    }

    fn is_heading(line: &str) -> bool {
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        (1..=6).contains(&hashes)
            && trimmed
                .chars()
                .nth(hashes)
                .is_none_or(|c| c == ' ' || c == '\t')
    }

    fn is_fence(line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with("```") || trimmed.starts_with("~~~")
    }
}

impl ChunkStrategy for MarkdownChunker {
    fn chunk(&self, file: &DiscoveredFile, content: &str) -> ChunkingResult<Vec<CodeChunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut boundaries: Vec<usize> = vec![0];
        let mut in_fence = false;

        for (idx, line) in lines.iter().enumerate() {
            if Self::is_fence(line) {
                in_fence = !in_fence;
                continue;
            }
            if !in_fence && idx > 0 && Self::is_heading(line) {
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
            let section = lines[start..end].join("\n");
            if section.trim().is_empty() {
                continue;
            }
            let span = Span::new(start + 1, end, file.source_id)?;
            chunks.push(CodeChunk::new(
                section,
                span,
                file.path.clone(),
                file.ext_kind,
                ChunkSource::TextBlock,
            ));
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_headings() {
        let content = "# Title\nintro text\n## Section A\nbody a\n## Section B\nbody b";
        let file = DiscoveredFile::from_content("README.md", content.as_bytes());
        let chunks = MarkdownChunker::new().chunk(&file, content).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].content.starts_with("# Title"));
        assert!(chunks[1].content.starts_with("## Section A"));
        assert_eq!(chunks[1].line_range.start_line, 3);
        assert!(chunks.iter().all(|c| c.source == ChunkSource::TextBlock));
    }

    #[test]
    fn test_fenced_code_is_not_a_heading() {
        let content = "# Title\n```sh\n# not a heading\n```\n## Real";
        let file = DiscoveredFile::from_content("README.md", content.as_bytes());
        let chunks = MarkdownChunker::new().chunk(&file, content).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.contains("# not a heading"));
    }

    #[test]
    fn test_no_headings_single_section() {
        let content = "just prose\nmore prose";
        let file = DiscoveredFile::from_content("NOTES.md", content.as_bytes());
        let chunks = MarkdownChunker::new().chunk(&file, content).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_heading_detection() {
        assert!(MarkdownChunker::is_heading("# h1"));
        assert!(MarkdownChunker::is_heading("###### h6"));
        assert!(!MarkdownChunker::is_heading("####### too deep"));
        assert!(!MarkdownChunker::is_heading("#hashtag"));
    }
}
