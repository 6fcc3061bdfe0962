//! Server capability flags
//!
//! `Feature` is a bit-set of capabilities the server can advertise. Each
//! flag may depend on other flags (hybrid search needs sparse and vector
//! indexing, for example); the dependency closure operations here let
//! callers validate a configuration or compute the minimal set required
//! for a requested capability.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// A set of server capabilities, represented as bit flags.
///
/// ```
/// use codeweaver_common::Feature;
///
/// let requested = Feature::HYBRID_SEARCH | Feature::RERANKING;
/// let required = requested.resolve_all_dependencies();
/// assert!(required.contains(Feature::SPARSE_INDEXING));
/// assert!(required.validate_dependencies());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Feature(u32);

impl Feature {
    /// The empty capability set.
    pub const NONE: Self = Self(0);

    // Infrastructure
    pub const FILE_DISCOVERY: Self = Self(1 << 0);
    pub const FILE_FILTER: Self = Self(1 << 1);
    pub const FILE_WATCHER: Self = Self(1 << 2);
    pub const LOGGING: Self = Self(1 << 3);
    pub const HEALTH: Self = Self(1 << 4);
    pub const ERROR_HANDLING: Self = Self(1 << 5);
    pub const RATE_LIMITING: Self = Self(1 << 6);
    pub const STATISTICS: Self = Self(1 << 7);

    // Indexing
    pub const SPARSE_INDEXING: Self = Self(1 << 8);
    pub const VECTOR_INDEXING: Self = Self(1 << 9);
    pub const AUTOMATIC_INDEXING: Self = Self(1 << 10);

    // Search
    pub const BASIC_SEARCH: Self = Self(1 << 11);
    pub const SEMANTIC_SEARCH: Self = Self(1 << 12);
    pub const VECTOR_SEARCH: Self = Self(1 << 13);
    pub const HYBRID_SEARCH: Self = Self(1 << 14);
    pub const RERANKING: Self = Self(1 << 15);

    // Agents
    pub const AGENT: Self = Self(1 << 16);
    pub const CONTEXT_AGENT: Self = Self(1 << 17);
    pub const PRECONTEXT_AGENT: Self = Self(1 << 18);
    pub const WEB_SEARCH: Self = Self(1 << 19);

    const ALL_FLAGS: [Self; 20] = [
        Self::FILE_DISCOVERY,
        Self::FILE_FILTER,
        Self::FILE_WATCHER,
        Self::LOGGING,
        Self::HEALTH,
        Self::ERROR_HANDLING,
        Self::RATE_LIMITING,
        Self::STATISTICS,
        Self::SPARSE_INDEXING,
        Self::VECTOR_INDEXING,
        Self::AUTOMATIC_INDEXING,
        Self::BASIC_SEARCH,
        Self::SEMANTIC_SEARCH,
        Self::VECTOR_SEARCH,
        Self::HYBRID_SEARCH,
        Self::RERANKING,
        Self::AGENT,
        Self::CONTEXT_AGENT,
        Self::PRECONTEXT_AGENT,
        Self::WEB_SEARCH,
    ];

    /// Static dependency table for a single flag.
    pub fn dependencies(flag: Self) -> Self {
        match flag {
            Self::BASIC_SEARCH => Self::FILE_DISCOVERY,
            Self::SEMANTIC_SEARCH => Self::BASIC_SEARCH,
            Self::VECTOR_SEARCH => Self::BASIC_SEARCH | Self::VECTOR_INDEXING,
            Self::HYBRID_SEARCH => {
                Self::SPARSE_INDEXING | Self::VECTOR_INDEXING | Self::BASIC_SEARCH
            }
            Self::RERANKING => Self::BASIC_SEARCH | Self::VECTOR_SEARCH,
            Self::AUTOMATIC_INDEXING => Self::FILE_DISCOVERY | Self::FILE_WATCHER,
            Self::FILE_WATCHER => Self::FILE_DISCOVERY | Self::FILE_FILTER,
            Self::CONTEXT_AGENT => Self::VECTOR_SEARCH | Self::RERANKING,
            Self::PRECONTEXT_AGENT => Self::VECTOR_SEARCH | Self::RERANKING | Self::AGENT,
            Self::WEB_SEARCH => Self::AGENT,
            _ => Self::NONE,
        }
    }

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the individual flags set in this value.
    pub fn iter(self) -> impl Iterator<Item = Self> {
        Self::ALL_FLAGS
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }

    /// Resolve the transitive closure of dependencies for every set flag.
    ///
    /// Applying this twice yields the same result (it is a closure).
    pub fn resolve_all_dependencies(self) -> Self {
        let mut resolved = Self::NONE;
        let mut to_process: Vec<Self> = self.iter().collect();

        while let Some(flag) = to_process.pop() {
            if !resolved.contains(flag) {
                resolved |= flag;
                for dep in Self::dependencies(flag).iter() {
                    if !resolved.contains(dep) {
                        to_process.push(dep);
                    }
                }
            }
        }

        resolved
    }

    /// Check that every dependency of every set flag is also set.
    pub fn validate_dependencies(self) -> bool {
        let resolved = self.resolve_all_dependencies();
        (resolved & self) == resolved
    }

    /// The dependencies that are required but not set.
    pub fn missing_dependencies(self) -> Self {
        let resolved = self.resolve_all_dependencies();
        resolved & !self
    }

    /// Compute the minimal feature set that includes `features` and every
    /// transitive dependency.
    pub fn minimal_set_for(features: &[Self]) -> Self {
        let mut requested = Self::NONE;
        for feature in features {
            requested |= *feature;
        }
        requested.resolve_all_dependencies()
    }

    /// Human-readable name for a single flag; `None` for compound sets.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::FILE_DISCOVERY => Some("file_discovery"),
            Self::FILE_FILTER => Some("file_filter"),
            Self::FILE_WATCHER => Some("file_watcher"),
            Self::LOGGING => Some("logging"),
            Self::HEALTH => Some("health"),
            Self::ERROR_HANDLING => Some("error_handling"),
            Self::RATE_LIMITING => Some("rate_limiting"),
            Self::STATISTICS => Some("statistics"),
            Self::SPARSE_INDEXING => Some("sparse_indexing"),
            Self::VECTOR_INDEXING => Some("vector_indexing"),
            Self::AUTOMATIC_INDEXING => Some("automatic_indexing"),
            Self::BASIC_SEARCH => Some("basic_search"),
            Self::SEMANTIC_SEARCH => Some("semantic_search"),
            Self::VECTOR_SEARCH => Some("vector_search"),
            Self::HYBRID_SEARCH => Some("hybrid_search"),
            Self::RERANKING => Some("reranking"),
            Self::AGENT => Some("agent"),
            Self::CONTEXT_AGENT => Some("context_agent"),
            Self::PRECONTEXT_AGENT => Some("precontext_agent"),
            Self::WEB_SEARCH => Some("web_search"),
            _ => None,
        }
    }
}

impl BitOr for Feature {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Feature {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Feature {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Feature {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().filter_map(Self::name).collect();
        write!(f, "{}", names.join("|"))
    }
}
