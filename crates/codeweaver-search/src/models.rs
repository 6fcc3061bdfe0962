//! Request and response models for `find_code`

use serde::{Deserialize, Serialize};

use codeweaver_chunking::{CodeChunk, DiscoveredFile, Span};
use codeweaver_common::{error_excerpt, truncate_to_boundary};

use crate::error::{SearchError, SearchResult};
use crate::intent::IntentType;

/// Default token budget for a response.
pub const DEFAULT_TOKEN_LIMIT: u32 = 10_000;
/// Upper bound on the token budget.
pub const MAX_TOKEN_LIMIT: u32 = 200_000;
/// Default number of returned results.
pub const DEFAULT_MAX_RESULTS: u32 = 50;
/// Upper bound on returned results.
pub const MAX_MAX_RESULTS: u32 = 500;
/// Hard cap on the summary string.
pub const MAX_SUMMARY_CHARS: usize = 1_000;

/// Strategies the pipeline actually used, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    HybridSearch,
    DenseOnly,
    SparseOnly,
    SemanticRerank,
    KeywordFallback,
}

/// How a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeMatchType {
    /// Vector search (always the case in this pipeline)
    Semantic,
    /// Reserved for keyword/grep-style matches
    Keyword,
}

/// One ranked code match in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMatch {
    /// The owning file
    pub file: DiscoveredFile,
    /// The matched chunk
    pub content: CodeChunk,
    /// The chunk's line range
    pub span: Span,
    /// Final semantic-weighted score
    pub relevance_score: f32,
    /// How the match was found
    pub match_type: CodeMatchType,
    /// Symbols related to the match, when metadata carries them
    pub related_symbols: Vec<String>,
}

/// Validated `find_code` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindCodeRequest {
    /// Natural-language query
    pub query: String,
    /// Explicit intent; auto-detected when absent
    #[serde(default)]
    pub intent: Option<IntentType>,
    /// Token budget for the response
    #[serde(default = "default_token_limit")]
    pub token_limit: u32,
    /// Whether test files may appear in results
    #[serde(default)]
    pub include_tests: bool,
    /// Restrict results to these languages
    #[serde(default)]
    pub focus_languages: Option<Vec<String>>,
    /// Maximum results to return
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_token_limit() -> u32 {
    DEFAULT_TOKEN_LIMIT
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

impl FindCodeRequest {
    /// Request with defaults for everything but the query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            intent: None,
            token_limit: DEFAULT_TOKEN_LIMIT,
            include_tests: false,
            focus_languages: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set an explicit intent.
    #[must_use]
    pub fn with_intent(mut self, intent: IntentType) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Validate bounds at the boundary; the pipeline never re-checks.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for an empty query or
    /// out-of-range limits.
    pub fn validate(&self) -> SearchResult<()> {
        if self.query.trim().is_empty() {
            return Err(SearchError::Validation("query must not be empty".to_string()));
        }
        if self.token_limit == 0 || self.token_limit > MAX_TOKEN_LIMIT {
            return Err(SearchError::Validation(format!(
                "token_limit {} outside 1..={MAX_TOKEN_LIMIT}",
                self.token_limit
            )));
        }
        if self.max_results == 0 || self.max_results > MAX_MAX_RESULTS {
            return Err(SearchError::Validation(format!(
                "max_results {} outside 1..={MAX_MAX_RESULTS}",
                self.max_results
            )));
        }
        Ok(())
    }
}

/// The `find_code` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindCodeResponseSummary {
    /// Ranked matches, token-bounded
    pub matches: Vec<CodeMatch>,
    /// Human-readable summary (<= 1000 chars)
    pub summary: String,
    /// The intent the pipeline worked with
    pub query_intent: Option<IntentType>,
    /// Candidates before the result limit
    pub total_matches: usize,
    /// Matches actually returned
    pub total_results: usize,
    /// Estimated tokens in the returned content (<= token_limit)
    pub token_count: usize,
    /// Wall-clock pipeline time
    pub execution_time_ms: f64,
    /// Strategies used, in order
    pub search_strategy: Vec<SearchStrategy>,
    /// De-duplicated languages across matches, config languages excluded
    pub languages_found: Vec<String>,
}

impl FindCodeResponseSummary {
    /// The degraded empty response every failure path returns.
    pub fn degraded(
        error_message: &str,
        query_intent: Option<IntentType>,
        execution_time_ms: f64,
    ) -> Self {
        let shown = error_excerpt(error_message);
        let summary = format!("Search failed: {shown}");
        let summary = truncate_to_boundary(&summary, MAX_SUMMARY_CHARS).to_string();
        Self {
            matches: Vec::new(),
            summary,
            query_intent,
            total_matches: 0,
            total_results: 0,
            token_count: 0,
            execution_time_ms,
            search_strategy: vec![SearchStrategy::KeywordFallback],
            languages_found: Vec::new(),
        }
    }
}
