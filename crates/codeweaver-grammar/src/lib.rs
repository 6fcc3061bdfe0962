//! CodeWeaver grammar model crate
//!
//! Replaces tree-sitter's overloaded vocabulary with a disjoint, intuitive
//! model (Categories, Things, Connections) so classification rules and
//! chunkers can be implemented cleanly. Also owns language identification:
//! extensions, structural fingerprints, and config-file recognizers.

pub mod classify;
pub mod error;
pub mod ext_kind;
pub mod language;
pub mod node_types;
pub mod registry;
pub mod things;

pub use classify::{AgentTask, ImportanceScores, SemanticClass, classify_name, classify_thing};
pub use error::{GrammarError, GrammarResult};
pub use ext_kind::{ExtKind, FileCategory};
pub use language::{ConfigLanguage, LanguageConfigFile, SemanticSearchLanguage};
pub use registry::{GrammarRegistry, default_registry};
pub use things::{
    Cardinality, Category, Connection, ConnectionClass, DirectConnection, PositionalConnections,
    Thing, ThingDetail, ThingKind, TokenPurpose,
};
