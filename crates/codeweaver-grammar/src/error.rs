//! Error types for the codeweaver-grammar crate

use thiserror::Error;

/// Result type alias for grammar operations
pub type GrammarResult<T> = Result<T, GrammarError>;

/// Errors raised while building or querying the grammar model
#[derive(Error, Debug)]
pub enum GrammarError {
    /// Node-type descriptor JSON failed to parse
    #[error("Node type descriptor parse failed for {language}: {source}")]
    NodeTypeParse {
        language: String,
        #[source]
        source: serde_json::Error,
    },

    /// A connection referenced a source Thing that was never registered
    #[error("Unknown source thing '{thing}' for language {language}")]
    UnknownThing { thing: String, language: String },

    /// A direct connection was registered without a role
    #[error("Direct connection from '{thing}' is missing a role")]
    MissingRole { thing: String },

    /// Lookup for a language with no loaded grammar
    #[error("No grammar loaded for language {0}")]
    LanguageNotLoaded(String),

    /// Generic error for other cases
    #[error("Grammar error: {0}")]
    Other(String),
}
