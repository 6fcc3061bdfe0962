//! Token counting for chunk budgets

use std::sync::Arc;

use anyhow::Result;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Trait for counting tokens in text
///
/// Implementations provide model-specific token counting without coupling
/// to embedding providers
pub trait TokenCounter: Send + Sync {
    /// Get the name/identifier of this counter
    fn name(&self) -> &str;

    /// Maximum number of tokens this model can handle
    fn max_tokens(&self) -> usize;

    /// Count tokens in the given text
    ///
    /// This should be fast and deterministic for the same input
    fn count(&self, text: &str) -> usize;

    /// Count tokens for multiple texts efficiently
    fn count_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|text| self.count(text)).collect()
    }
}

/// Type alias for shared token counter
pub type TokenCounterRef = Arc<dyn TokenCounter>;

/// Token budget configuration for chunking
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    /// Absolute maximum tokens (model limit)
    pub hard: usize,
    /// Target tokens (usually 90% of hard limit)
    pub soft: usize,
    /// Number of tokens to overlap between chunks
    pub overlap: usize,
}

impl TokenBudget {
    /// Create a new token budget
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            hard: max_tokens,
            soft: (max_tokens as f64 * 0.9) as usize, // 90% target
            overlap: overlap_tokens,
        }
    }
}

/// Token counter backed by the tiktoken `cl100k_base` encoding.
pub struct TiktokenCounter {
    name: String,
    encoder: CoreBPE,
    max_tokens: usize,
}

impl TiktokenCounter {
    /// Create a counter with the given token limit.
    ///
    /// # Errors
    ///
    /// Returns an error when the tiktoken tables cannot be loaded.
    pub fn new(max_tokens: usize) -> Result<Self> {
        Ok(Self {
            name: "cl100k_base".to_string(),
            encoder: cl100k_base()?,
            max_tokens,
        })
    }
}

impl TokenCounter for TiktokenCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn count(&self, text: &str) -> usize {
        self.encoder.encode_ordinary(text).len()
    }
}

/// Fast heuristic counter that estimates from character count.
///
/// Used when the tiktoken tables are unavailable, and as the default for
/// tests. ~4 characters per token is a good approximation for code.
pub struct HeuristicCounter {
    name: String,
    max_tokens: usize,
    chars_per_token: f64,
}

impl HeuristicCounter {
    /// Create a new heuristic counter with the default 4.0 ratio
    pub fn new(max_tokens: usize) -> Self {
        Self {
            name: "heuristic".to_string(),
            max_tokens,
            chars_per_token: 4.0,
        }
    }

    /// Create with a custom chars-per-token ratio
    pub fn with_ratio(max_tokens: usize, chars_per_token: f64) -> Self {
        Self {
            name: "heuristic".to_string(),
            max_tokens,
            chars_per_token,
        }
    }
}

impl TokenCounter for HeuristicCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn count(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Default counter: tiktoken when available, heuristic otherwise.
pub fn default_counter(max_tokens: usize) -> TokenCounterRef {
    match TiktokenCounter::new(max_tokens) {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            tracing::warn!("tiktoken unavailable, using heuristic counter: {e}");
            Arc::new(HeuristicCounter::new(max_tokens))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_budget() {
        let budget = TokenBudget::new(100, 10);
        assert_eq!(budget.hard, 100);
        assert_eq!(budget.soft, 90); // 90% of hard
        assert_eq!(budget.overlap, 10);
    }

    #[test]
    fn test_heuristic_counter() {
        let counter = HeuristicCounter::new(512);
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcdefgh"), 2);
        assert_eq!(counter.count("abcde"), 2); // ceil
    }

    #[test]
    fn test_heuristic_counter_custom_ratio() {
        let counter = HeuristicCounter::with_ratio(100, 2.0);
        assert_eq!(counter.count("abcd"), 2);
    }

    #[test]
    fn test_count_batch_default_impl() {
        let counter = HeuristicCounter::new(512);
        let counts = counter.count_batch(&["abcd", "abcdefgh"]);
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn test_tiktoken_counter() {
        let counter = TiktokenCounter::new(8192).expect("tiktoken tables");
        assert_eq!(counter.max_tokens(), 8192);
        assert_eq!(counter.count(""), 0);
        let count = counter.count("fn main() { println!(\"hello\"); }");
        assert!(count > 0 && count < 20);
    }
}
