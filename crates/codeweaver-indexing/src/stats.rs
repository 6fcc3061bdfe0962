//! Indexing statistics and progress reporting

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Pipeline phase markers handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexingPhase {
    Discovery,
    Chunking,
    Embedding,
    Storage,
}

/// Counters for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexingStats {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_indexed: usize,
    pub files_with_errors: Vec<PathBuf>,
    pub start_time: Instant,
}

impl Default for IndexingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexingStats {
    /// Fresh counters starting now.
    pub fn new() -> Self {
        Self {
            files_discovered: 0,
            files_processed: 0,
            chunks_created: 0,
            chunks_embedded: 0,
            chunks_indexed: 0,
            files_with_errors: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Seconds since the run started.
    pub fn elapsed_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Files processed per second; zero before any time has passed.
    pub fn processing_rate(&self) -> f64 {
        let elapsed = self.elapsed_time();
        if elapsed > 0.0 {
            self.files_processed as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Number of files that errored.
    pub fn total_errors(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Callback invoked at phase boundaries with a stats snapshot.
pub type ProgressCallback = Arc<dyn Fn(IndexingPhase, &IndexingStats) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_stats() {
        let stats = IndexingStats::new();
        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.total_errors(), 0);
        assert!(stats.elapsed_time() >= 0.0);
    }

    #[test]
    fn test_processing_rate() {
        let mut stats = IndexingStats::new();
        stats.files_processed = 10;
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(stats.processing_rate() > 0.0);
    }
}
