//! Recursive character splitter
//!
//! The last-resort strategy: accumulate whole lines until the character
//! window fills, preferring to break at blank lines. Never returns an
//! empty chunk list for non-empty input, which is what makes the strategy
//! chain total.

use crate::chunks::{ChunkSource, CodeChunk};
use crate::discovery::DiscoveredFile;
use crate::error::ChunkingResult;
use crate::spans::Span;
use crate::strategies::ChunkStrategy;

/// Line-accumulating splitter with a character window.
pub struct RecursiveChunker {
    max_chars: usize,
}

impl RecursiveChunker {
    /// Splitter with the given character window.
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    fn flush(
        &self,
        file: &DiscoveredFile,
        lines: &[&str],
        start_line: usize,
        chunks: &mut Vec<CodeChunk>,
    ) -> ChunkingResult<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let content = lines.join("\n");
        if content.trim().is_empty() {
            return Ok(());
        }
        let span = Span::new(
            start_line,
            start_line + lines.len() - 1,
            file.source_id,
        )?;
        chunks.push(CodeChunk::new(
            content,
            span,
            file.path.clone(),
            file.ext_kind,
            ChunkSource::Recursive,
        ));
        Ok(())
    }
}

impl ChunkStrategy for RecursiveChunker {
    fn chunk(&self, file: &DiscoveredFile, content: &str) -> ChunkingResult<Vec<CodeChunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        let mut window_start = 0usize; // index into `lines`
        let mut window_chars = 0usize;
        let mut last_blank: Option<usize> = None;

        let mut i = 0usize;
        while i < lines.len() {
            let line_len = lines[i].len() + 1;
            if lines[i].trim().is_empty() {
                last_blank = Some(i);
            }

            if window_chars + line_len > self.max_chars && i > window_start {
                // Prefer breaking at the last blank line inside the window.
                let break_at = match last_blank {
                    Some(blank) if blank > window_start => blank,
                    _ => i,
                };
                self.flush(
                    file,
                    &lines[window_start..break_at],
                    window_start + 1,
                    &mut chunks,
                )?;
                window_start = break_at;
                window_chars = lines[window_start..=i.min(lines.len() - 1)]
                    .iter()
                    .map(|l| l.len() + 1)
                    .sum();
                last_blank = None;
            } else {
                window_chars += line_len;
            }
            i += 1;
        }

        self.flush(file, &lines[window_start..], window_start + 1, &mut chunks)?;

        // Whitespace-only content still yields one chunk so the stream is
        // never empty for a non-empty file.
        if chunks.is_empty() {
            let span = Span::new(1, lines.len().max(1), file.source_id)?;
            chunks.push(CodeChunk::new(
                content.to_string(),
                span,
                file.path.clone(),
                file.ext_kind,
                ChunkSource::Recursive,
            ));
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_for(content: &str) -> DiscoveredFile {
        DiscoveredFile::from_content("notes.xyz", content.as_bytes())
    }

    #[test]
    fn test_small_content_single_chunk() {
        let content = "line one\nline two\nline three";
        let chunks = RecursiveChunker::new(2000)
            .chunk(&file_for(content), content)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line_range.start_line, 1);
        assert_eq!(chunks[0].line_range.end_line, 3);
        assert_eq!(chunks[0].source, ChunkSource::Recursive);
    }

    #[test]
    fn test_window_splits_content() {
        let content = (1..=40)
            .map(|i| format!("line number {i} with some padding text"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = RecursiveChunker::new(200)
            .chunk(&file_for(&content), &content)
            .unwrap();
        assert!(chunks.len() > 1);

        // Disjoint, ordered, and within the file
        let total_lines = content.lines().count();
        for pair in chunks.windows(2) {
            assert!(pair[0].line_range.end_line < pair[1].line_range.start_line);
        }
        for chunk in &chunks {
            assert!(chunk.line_range.fits_in_file(total_lines));
        }
    }

    #[test]
    fn test_prefers_blank_line_breaks() {
        let content = "aaaa\naaaa\n\nbbbb\nbbbb";
        let chunks = RecursiveChunker::new(14)
            .chunk(&file_for(content), content)
            .unwrap();
        assert!(chunks.len() >= 2);
        // First chunk ends at or before the blank line
        assert!(chunks[0].line_range.end_line <= 3);
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        let chunks = RecursiveChunker::new(100).chunk(&file_for(""), "").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_nonempty_content_never_yields_nothing() {
        let content = "   \n   ";
        let chunks = RecursiveChunker::new(100)
            .chunk(&file_for(content), content)
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
