//! CodeWeaver search crate
//!
//! The `find_code` query pipeline: intent detection, dual (dense + sparse)
//! query embedding, hybrid vector search, reranking, semantic rescoring,
//! and token-bounded response assembly. Agents always get a response -
//! failures degrade to an empty result tagged with the fallback strategy.

pub mod error;
pub mod find_code;
pub mod intent;
pub mod models;

pub use error::{SearchError, SearchResult};
pub use find_code::{FindCodeService, apply_semantic_boost, combine_hybrid_score, semantic_boost};
pub use intent::{DetectedIntent, IntentType, agent_task_for, detect_intent};
pub use models::{
    CodeMatch, CodeMatchType, DEFAULT_MAX_RESULTS, DEFAULT_TOKEN_LIMIT, FindCodeRequest,
    FindCodeResponseSummary, SearchStrategy,
};
