//! Line spans
//!
//! A [`Span`] is a closed-closed, 1-based line range bound to a source
//! identifier: `start_line` and `end_line` are both inclusive, and line 1
//! is the first line of the file. The constructor rejects zero or inverted
//! ranges, so a `Span` in hand is always valid.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChunkingError, ChunkingResult};

/// An inclusive 1-based line range bound to a source id (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// First line, inclusive, >= 1
    pub start_line: usize,
    /// Last line, inclusive, >= start_line
    pub end_line: usize,
    /// Identifier of the source the range refers to
    pub source_id: Uuid,
}

impl Span {
    /// Build a validated span.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::InvalidSpan`] when `start_line` is zero or
    /// greater than `end_line`.
    pub fn new(start_line: usize, end_line: usize, source_id: Uuid) -> ChunkingResult<Self> {
        if start_line == 0 || start_line > end_line {
            return Err(ChunkingError::InvalidSpan {
                start: start_line,
                end: end_line,
            });
        }
        Ok(Self {
            start_line,
            end_line,
            source_id,
        })
    }

    /// A single-line span.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::InvalidSpan`] when `line` is zero.
    pub fn single(line: usize, source_id: Uuid) -> ChunkingResult<Self> {
        Self::new(line, line, source_id)
    }

    /// Number of lines covered (both ends inclusive).
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Whether this span lies entirely within a file of `total_lines` lines.
    pub fn fits_in_file(&self, total_lines: usize) -> bool {
        self.end_line <= total_lines
    }

    /// Whether two spans on the same source overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.source_id == other.source_id
            && self.start_line <= other.end_line
            && other.start_line <= self.end_line
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_validation() {
        let id = Uuid::now_v7();
        assert!(Span::new(1, 10, id).is_ok());
        assert!(Span::new(5, 5, id).is_ok());
        assert!(Span::new(0, 10, id).is_err());
        assert!(Span::new(10, 5, id).is_err());
    }

    #[test]
    fn test_line_count_is_inclusive() {
        let id = Uuid::now_v7();
        assert_eq!(Span::new(1, 1, id).unwrap().line_count(), 1);
        assert_eq!(Span::new(3, 7, id).unwrap().line_count(), 5);
    }

    #[test]
    fn test_fits_in_file() {
        let id = Uuid::now_v7();
        let span = Span::new(2, 4, id).unwrap();
        assert!(span.fits_in_file(4));
        assert!(!span.fits_in_file(3));
    }

    #[test]
    fn test_overlap_requires_same_source() {
        let a = Span::new(1, 5, Uuid::now_v7()).unwrap();
        let b = Span::new(3, 8, a.source_id).unwrap();
        let c = Span::new(3, 8, Uuid::now_v7()).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
