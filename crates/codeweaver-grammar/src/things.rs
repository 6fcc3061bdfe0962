//! The grammar model
//!
//! Tree-sitter's vocabulary overloads "node" to mean abstract supertypes,
//! concrete rules, and anonymous tokens all at once. This module reifies the
//! grammar into three disjoint ideas:
//!
//! - **Category** - an abstract grouping (a tree-sitter supertype). Never
//!   appears in a parse tree; referenced for polymorphic type constraints.
//! - **Thing** - a concrete parse-tree element: a [`Token`] leaf or a
//!   composite with children.
//! - **Connection** - a directed edge from a parent composite to child
//!   target(s). Direct connections carry a named role; positional
//!   connections are ordered and unnamed.
//!
//! Things reference Categories by name and Categories reference Things by
//! name; the registry owns the storage and resolves the indirection, so no
//! ownership cycles exist.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::language::SemanticSearchLanguage;

/// Normalize a grammar rule name for registry keys.
///
/// Tree-sitter names are already snake_case; this trims whitespace and
/// lowercases ASCII so lookups are insensitive to descriptor quirks.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Whether a Thing is a leaf token or a composite with children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThingKind {
    Token,
    Composite,
}

/// What a leaf token is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Keyword,
    Identifier,
    Literal,
    Punctuation,
    Comment,
}

/// Connection cardinality, derived from `(requires_presence, allows_multiple)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ZeroOrOne,
    ZeroOrMany,
    OnlyOne,
    OneOrMany,
}

impl Cardinality {
    /// Derive cardinality from the two grammar constraints.
    pub fn from_constraints(requires_presence: bool, allows_multiple: bool) -> Self {
        match (requires_presence, allows_multiple) {
            (false, false) => Self::ZeroOrOne,
            (false, true) => Self::ZeroOrMany,
            (true, false) => Self::OnlyOne,
            (true, true) => Self::OneOrMany,
        }
    }
}

/// Kind-specific payload of a Thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThingDetail {
    /// A leaf token with its purpose
    Token { purpose: TokenPurpose },
    /// A composite node; `is_file` marks the grammar's root rule
    Composite { is_file: bool },
}

/// A concrete parse-tree element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    /// Normalized rule name
    pub name: String,
    /// Owning language
    pub language: SemanticSearchLanguage,
    /// True for named grammar rules, false for anonymous tokens like `"{"`
    pub is_explicit_rule: bool,
    /// True for "extra" nodes that may appear anywhere in the tree
    /// (comments are the canonical case)
    pub can_be_anywhere: bool,
    /// Names of the Categories this Thing belongs to
    pub categories: BTreeSet<String>,
    /// Token- or composite-specific attributes
    pub detail: ThingDetail,
}

impl Thing {
    /// Build a token Thing.
    pub fn token(
        name: &str,
        language: SemanticSearchLanguage,
        purpose: TokenPurpose,
        is_explicit_rule: bool,
    ) -> Self {
        Self {
            name: normalize_name(name),
            language,
            is_explicit_rule,
            can_be_anywhere: false,
            categories: BTreeSet::new(),
            detail: ThingDetail::Token { purpose },
        }
    }

    /// Build a composite Thing.
    pub fn composite(name: &str, language: SemanticSearchLanguage, is_file: bool) -> Self {
        Self {
            name: normalize_name(name),
            language,
            is_explicit_rule: true,
            can_be_anywhere: false,
            categories: BTreeSet::new(),
            detail: ThingDetail::Composite { is_file },
        }
    }

    /// Token vs composite.
    pub fn kind(&self) -> ThingKind {
        match self.detail {
            ThingDetail::Token { .. } => ThingKind::Token,
            ThingDetail::Composite { .. } => ThingKind::Composite,
        }
    }

    /// Whether this is a leaf token.
    pub fn is_token(&self) -> bool {
        self.kind() == ThingKind::Token
    }

    /// Whether this is a composite.
    pub fn is_composite(&self) -> bool {
        self.kind() == ThingKind::Composite
    }

    /// The token purpose, for tokens.
    pub fn purpose(&self) -> Option<TokenPurpose> {
        match self.detail {
            ThingDetail::Token { purpose } => Some(purpose),
            ThingDetail::Composite { .. } => None,
        }
    }

    /// Whether this composite is the grammar's file root.
    pub fn is_file(&self) -> bool {
        matches!(self.detail, ThingDetail::Composite { is_file: true })
    }
}

impl std::fmt::Display for Thing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({:?})", self.language, self.name, self.kind())
    }
}

/// An abstract grouping of Things (a tree-sitter supertype).
///
/// Never appears in a parse tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Normalized supertype name
    pub name: String,
    /// Owning language
    pub language: SemanticSearchLanguage,
    /// Names of member Things (and nested Categories)
    pub member_names: BTreeSet<String>,
}

impl Category {
    /// Build a category from member names.
    pub fn new(
        name: &str,
        language: SemanticSearchLanguage,
        members: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: normalize_name(name),
            language,
            member_names: members.into_iter().map(|m| normalize_name(&m)).collect(),
        }
    }

    /// Whether a Thing name is a member.
    pub fn includes(&self, thing_name: &str) -> bool {
        self.member_names.contains(&normalize_name(thing_name))
    }

    /// Member names shared with another category.
    pub fn overlap_with(&self, other: &Self) -> BTreeSet<String> {
        self.member_names
            .intersection(&other.member_names)
            .cloned()
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.member_names.len()
    }

    /// Whether the category has no members.
    pub fn is_empty(&self) -> bool {
        self.member_names.is_empty()
    }
}

/// The class of a connection: named-field vs ordered-children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionClass {
    Direct,
    Positional,
}

/// A named-role edge from a parent composite to its target(s).
///
/// Invariant: `role` is never empty; the registry rejects violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectConnection {
    /// Parent Thing name
    pub source_thing: String,
    /// Semantic role of the edge (e.g. `condition`, `body`)
    pub role: String,
    /// Target names; may mix concrete Things and Category references
    pub target_thing_names: BTreeSet<String>,
    /// Whether more than one target instance may appear
    pub allows_multiple: bool,
    /// Whether at least one target instance must appear
    pub requires_presence: bool,
    /// Owning language
    pub language: SemanticSearchLanguage,
}

impl DirectConnection {
    /// Derived cardinality.
    pub fn cardinality(&self) -> Cardinality {
        Cardinality::from_constraints(self.requires_presence, self.allows_multiple)
    }

    /// Whether a target name is permitted on this edge.
    pub fn can_connect_to(&self, name: &str) -> bool {
        self.target_thing_names.contains(&normalize_name(name))
    }
}

/// The ordered, unnamed child edge set of a composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionalConnections {
    /// Parent Thing name
    pub source_thing: String,
    /// Permitted child names, in descriptor order
    pub target_thing_names: Vec<String>,
    /// Whether more than one child may appear
    pub allows_multiple: bool,
    /// Whether at least one child must appear
    pub requires_presence: bool,
    /// Owning language
    pub language: SemanticSearchLanguage,
}

impl PositionalConnections {
    /// Derived cardinality.
    pub fn cardinality(&self) -> Cardinality {
        Cardinality::from_constraints(self.requires_presence, self.allows_multiple)
    }

    /// Whether a child name is permitted.
    pub fn can_connect_to(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.target_thing_names.iter().any(|t| *t == name)
    }
}

/// Either connection class, for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    Direct(DirectConnection),
    Positional(PositionalConnections),
}

impl Connection {
    /// The connection class tag.
    pub fn class(&self) -> ConnectionClass {
        match self {
            Self::Direct(_) => ConnectionClass::Direct,
            Self::Positional(_) => ConnectionClass::Positional,
        }
    }

    /// The parent Thing name.
    pub fn source_thing(&self) -> &str {
        match self {
            Self::Direct(c) => &c.source_thing,
            Self::Positional(c) => &c.source_thing,
        }
    }

    /// The owning language.
    pub fn language(&self) -> SemanticSearchLanguage {
        match self {
            Self::Direct(c) => c.language,
            Self::Positional(c) => c.language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_derivation() {
        assert_eq!(
            Cardinality::from_constraints(false, false),
            Cardinality::ZeroOrOne
        );
        assert_eq!(
            Cardinality::from_constraints(false, true),
            Cardinality::ZeroOrMany
        );
        assert_eq!(
            Cardinality::from_constraints(true, false),
            Cardinality::OnlyOne
        );
        assert_eq!(
            Cardinality::from_constraints(true, true),
            Cardinality::OneOrMany
        );
    }

    #[test]
    fn test_thing_kind_accessors() {
        let token = Thing::token(
            "identifier",
            SemanticSearchLanguage::Rust,
            TokenPurpose::Identifier,
            true,
        );
        assert!(token.is_token());
        assert!(!token.is_composite());
        assert_eq!(token.purpose(), Some(TokenPurpose::Identifier));
        assert!(!token.is_file());

        let root = Thing::composite("source_file", SemanticSearchLanguage::Rust, true);
        assert!(root.is_composite());
        assert!(root.is_file());
        assert_eq!(root.purpose(), None);
    }

    #[test]
    fn test_category_membership_and_overlap() {
        let a = Category::new(
            "_expression",
            SemanticSearchLanguage::Rust,
            ["call_expression".to_string(), "binary_expression".to_string()],
        );
        let b = Category::new(
            "_statement",
            SemanticSearchLanguage::Rust,
            ["call_expression".to_string(), "let_declaration".to_string()],
        );
        assert!(a.includes("call_expression"));
        assert!(!a.includes("let_declaration"));
        let overlap = a.overlap_with(&b);
        assert_eq!(overlap.len(), 1);
        assert!(overlap.contains("call_expression"));
    }

    #[test]
    fn test_direct_connection_targets() {
        let conn = DirectConnection {
            source_thing: "if_expression".to_string(),
            role: "condition".to_string(),
            target_thing_names: ["_expression".to_string()].into_iter().collect(),
            allows_multiple: false,
            requires_presence: true,
            language: SemanticSearchLanguage::Rust,
        };
        assert_eq!(conn.cardinality(), Cardinality::OnlyOne);
        assert!(conn.can_connect_to("_expression"));
        assert!(!conn.can_connect_to("block"));
    }

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize_name("  Function_Item "), "function_item");
    }
}
