//! Query intent detection
//!
//! Keyword/heuristic classifier mapping a natural-language query to an
//! [`IntentType`] with a confidence in `[0, 1]`. Explicit intents
//! short-circuit with confidence 1.0 at the call site; this module only
//! handles the heuristic path.

use serde::{Deserialize, Serialize};

use codeweaver_grammar::AgentTask;

/// What the agent is trying to do with the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Build a mental model of existing code
    Understand,
    /// Write or extend code
    Implement,
    /// Chase a defect
    Debug,
    /// Improve performance
    Optimize,
    /// Work on tests
    Test,
    /// Work on documentation
    Document,
}

impl IntentType {
    /// Stable lowercase name for summaries and serialization.
    pub fn name(self) -> &'static str {
        match self {
            Self::Understand => "understand",
            Self::Implement => "implement",
            Self::Debug => "debug",
            Self::Optimize => "optimize",
            Self::Test => "test",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A detected intent with its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedIntent {
    pub intent_type: IntentType,
    pub confidence: f32,
}

/// Keyword groups per intent. Checked against the lowercased query;
/// multi-word entries match as substrings.
const INTENT_KEYWORDS: &[(IntentType, &[&str])] = &[
    (
        IntentType::Debug,
        &[
            "bug",
            "fix",
            "error",
            "broken",
            "crash",
            "fails",
            "failing",
            "not working",
            "why does",
            "debug",
            "regression",
        ],
    ),
    (
        IntentType::Implement,
        &[
            "implement",
            "add ",
            "create",
            "build",
            "write",
            "how do i",
            "extend",
            "support for",
            "new feature",
        ],
    ),
    (
        IntentType::Optimize,
        &[
            "optimize",
            "performance",
            "slow",
            "faster",
            "speed up",
            "memory usage",
            "bottleneck",
        ],
    ),
    (
        IntentType::Test,
        &["test", "coverage", "mock", "fixture", "assertion"],
    ),
    (
        IntentType::Document,
        &["document", "docs", "readme", "docstring", "comment for"],
    ),
    (
        IntentType::Understand,
        &[
            "how does",
            "what is",
            "what does",
            "explain",
            "understand",
            "where is",
            "where does",
            "architecture",
            "overview",
            "flow",
        ],
    ),
];

/// Detect the intent behind a query.
///
/// Scores each intent by keyword hits; ties break by declaration order
/// (debugging first, understanding last as the broad default). A query
/// matching nothing comes back as `Understand` with low confidence.
pub fn detect_intent(query: &str) -> DetectedIntent {
    let lowered = query.to_lowercase();

    let mut best: Option<(IntentType, usize)> = None;
    for (intent, keywords) in INTENT_KEYWORDS {
        let hits = keywords
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .count();
        if hits > 0 && best.is_none_or(|(_, best_hits)| hits > best_hits) {
            best = Some((*intent, hits));
        }
    }

    match best {
        Some((intent_type, hits)) => DetectedIntent {
            intent_type,
            confidence: (0.5 + 0.15 * hits as f32).min(1.0),
        },
        None => DetectedIntent {
            intent_type: IntentType::Understand,
            confidence: 0.3,
        },
    }
}

/// Total map from intent to the agent task used by semantic scoring.
///
/// Unmapped intents land on the designated fallback variant rather than a
/// stringly-typed default.
pub fn agent_task_for(intent: IntentType) -> AgentTask {
    match intent {
        IntentType::Understand => AgentTask::Comprehension,
        IntentType::Implement => AgentTask::Generation,
        IntentType::Debug => AgentTask::Debugging,
        IntentType::Document => AgentTask::Documentation,
        IntentType::Optimize | IntentType::Test => AgentTask::Default,
    }
}
