//! Semantic classification
//!
//! Given `(thing_name, language)` this module yields zero or more
//! [`SemanticClass`] tags through a three-tier lookup:
//!
//! 1. language-specific regex groups,
//! 2. generic cross-language regex groups,
//! 3. predicate checks that examine the Thing itself (needed where a name
//!    alone is ambiguous, e.g. `constructor_invocation` vs
//!    `constructor_declaration`).
//!
//! Tiers 1 and 2 are pure functions of the name; all regexes are compiled
//! once. Classification is best-effort: an empty result is a valid state.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::language::SemanticSearchLanguage;
use crate::things::{Thing, TokenPurpose};

/// The task profile an agent is pursuing, used to weight importance scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTask {
    /// Designated fallback when no more specific task applies
    #[default]
    Default,
    /// Reading code to build a mental model
    Comprehension,
    /// Writing new code
    Generation,
    /// Chasing a defect
    Debugging,
    /// Producing documentation
    Documentation,
}

/// Per-dimension importance of a semantic class for agent workflows.
///
/// All values are in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceScores {
    /// Finding the right place in an unfamiliar codebase
    pub discovery: f32,
    /// Understanding what code does
    pub comprehension: f32,
    /// Editing safely
    pub modification: f32,
    /// Locating defects
    pub debugging: f32,
}

impl ImportanceScores {
    const fn new(discovery: f32, comprehension: f32, modification: f32, debugging: f32) -> Self {
        Self {
            discovery,
            comprehension,
            modification,
            debugging,
        }
    }

    /// Adjust the profile for a task. The task emphasizes its own dimension
    /// without zeroing the others, so cross-dimension signal survives.
    pub fn for_task(self, task: AgentTask) -> Self {
        let emphasize = |primary: f32, rest: f32| -> Self {
            Self {
                discovery: (self.discovery * rest).min(1.0),
                comprehension: (self.comprehension * rest).min(1.0),
                modification: (self.modification * rest).min(1.0),
                debugging: (self.debugging * rest).min(1.0),
            }
            .with_raised(task, primary)
        };

        match task {
            AgentTask::Default => self,
            AgentTask::Comprehension | AgentTask::Documentation => emphasize(1.15, 0.95),
            AgentTask::Generation => emphasize(1.1, 1.0),
            AgentTask::Debugging => emphasize(1.2, 0.9),
        }
    }

    fn with_raised(mut self, task: AgentTask, factor: f32) -> Self {
        match task {
            AgentTask::Default => {}
            AgentTask::Comprehension | AgentTask::Documentation => {
                self.comprehension = (self.comprehension * factor).min(1.0);
            }
            AgentTask::Generation => {
                self.modification = (self.modification * factor).min(1.0);
            }
            AgentTask::Debugging => {
                self.debugging = (self.debugging * factor).min(1.0);
            }
        }
        self
    }
}

/// Semantic class tags attached to chunks and grammar Things.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticClass {
    /// Type-shaped definitions: structs, enums, classes, traits, interfaces
    DefinitionType,
    /// Callable definitions: functions, methods, constructors
    DefinitionCallable,
    /// Value definitions: consts, statics, variable declarations
    DefinitionValue,
    /// Branching control flow
    FlowBranching,
    /// Loops
    FlowLooping,
    /// Error handling: try/catch/except/rescue, error propagation
    FlowError,
    /// Call sites and instantiations
    Invocation,
    /// Identifiers and names
    SyntaxIdentifier,
    /// Literals
    SyntaxLiteral,
    /// Operators
    SyntaxOperator,
    /// Comments
    SyntaxComment,
    /// Module/namespace boundaries, including file roots
    BoundaryModule,
    /// Imports, includes, uses
    BoundaryImport,
}

impl SemanticClass {
    /// Static importance profile of this class.
    pub fn importance_scores(self) -> ImportanceScores {
        match self {
            Self::DefinitionType => ImportanceScores::new(0.95, 0.90, 0.80, 0.60),
            Self::DefinitionCallable => ImportanceScores::new(0.90, 0.85, 0.85, 0.80),
            Self::DefinitionValue => ImportanceScores::new(0.70, 0.65, 0.75, 0.65),
            Self::FlowBranching => ImportanceScores::new(0.45, 0.70, 0.60, 0.90),
            Self::FlowLooping => ImportanceScores::new(0.45, 0.70, 0.60, 0.85),
            Self::FlowError => ImportanceScores::new(0.50, 0.65, 0.60, 0.95),
            Self::Invocation => ImportanceScores::new(0.60, 0.60, 0.70, 0.85),
            Self::SyntaxIdentifier => ImportanceScores::new(0.40, 0.35, 0.45, 0.50),
            Self::SyntaxLiteral => ImportanceScores::new(0.30, 0.30, 0.40, 0.55),
            Self::SyntaxOperator => ImportanceScores::new(0.15, 0.25, 0.30, 0.40),
            Self::SyntaxComment => ImportanceScores::new(0.55, 0.85, 0.40, 0.45),
            Self::BoundaryModule => ImportanceScores::new(0.85, 0.80, 0.55, 0.45),
            Self::BoundaryImport => ImportanceScores::new(0.65, 0.60, 0.70, 0.55),
        }
    }
}

lazy_static! {
    // Tier 2: generic cross-language groups. Order matters; first match
    // per group wins, but multiple groups may each contribute a tag.
    static ref GENERIC_GROUPS: Vec<(Regex, SemanticClass)> = vec![
        (
            Regex::new(r"^(function|method|func|fn|constructor|lambda|closure)_(item|definition|declaration|expression)$")
                .expect("static regex"),
            SemanticClass::DefinitionCallable,
        ),
        (
            Regex::new(r"^(struct|enum|class|trait|interface|union|record|type|impl|protocol)_(item|definition|declaration|specifier|alias)$")
                .expect("static regex"),
            SemanticClass::DefinitionType,
        ),
        (
            Regex::new(r"^(const|static|let|var|variable|field|property|parameter)_(item|declaration|definition|declarator)$")
                .expect("static regex"),
            SemanticClass::DefinitionValue,
        ),
        (
            Regex::new(r"^(if|elif|else|match|switch|case|when|conditional|ternary)_(expression|statement|clause|arm)$")
                .expect("static regex"),
            SemanticClass::FlowBranching,
        ),
        (
            Regex::new(r"^(for|while|loop|do|foreach|repeat)_(expression|statement|clause)$")
                .expect("static regex"),
            SemanticClass::FlowLooping,
        ),
        (
            Regex::new(r"^(try|catch|except|finally|rescue|throw|raise|panic|defer)_(expression|statement|clause|block)$")
                .expect("static regex"),
            SemanticClass::FlowError,
        ),
        (
            Regex::new(r"^(call|invocation|macro_invocation|new|instantiation|await)_?(expression|statement)?$")
                .expect("static regex"),
            SemanticClass::Invocation,
        ),
        (
            Regex::new(r"^(mod|module|namespace|package)_(item|declaration|definition|clause)$")
                .expect("static regex"),
            SemanticClass::BoundaryModule,
        ),
        (
            Regex::new(r"^(use|import|include|require|extern_crate|using)_(declaration|statement|directive|item|from_statement)$")
                .expect("static regex"),
            SemanticClass::BoundaryImport,
        ),
        (
            Regex::new(r"comment").expect("static regex"),
            SemanticClass::SyntaxComment,
        ),
    ];

    // Tier 1: language-specific groups that the generic patterns miss.
    static ref RUST_GROUPS: Vec<(Regex, SemanticClass)> = vec![
        (
            Regex::new(r"^(macro_definition|function_signature_item)$").expect("static regex"),
            SemanticClass::DefinitionCallable,
        ),
        (
            Regex::new(r"^(match_expression|if_let_expression)$").expect("static regex"),
            SemanticClass::FlowBranching,
        ),
        (
            Regex::new(r"^(try_expression|question_mark)$").expect("static regex"),
            SemanticClass::FlowError,
        ),
        (
            Regex::new(r"^use_declaration$").expect("static regex"),
            SemanticClass::BoundaryImport,
        ),
    ];

    static ref PYTHON_GROUPS: Vec<(Regex, SemanticClass)> = vec![
        (
            Regex::new(r"^(function_definition|decorated_definition|lambda)$")
                .expect("static regex"),
            SemanticClass::DefinitionCallable,
        ),
        (
            Regex::new(r"^class_definition$").expect("static regex"),
            SemanticClass::DefinitionType,
        ),
        (
            Regex::new(r"^(import_statement|import_from_statement)$").expect("static regex"),
            SemanticClass::BoundaryImport,
        ),
        (
            Regex::new(r"^(try_statement|except_clause|raise_statement|with_statement)$")
                .expect("static regex"),
            SemanticClass::FlowError,
        ),
        (
            Regex::new(r"^(conditional_expression|if_statement)$").expect("static regex"),
            SemanticClass::FlowBranching,
        ),
    ];

    static ref JS_TS_GROUPS: Vec<(Regex, SemanticClass)> = vec![
        (
            Regex::new(r"^(arrow_function|generator_function_declaration|method_definition)$")
                .expect("static regex"),
            SemanticClass::DefinitionCallable,
        ),
        (
            Regex::new(r"^(class_declaration|interface_declaration|type_alias_declaration|enum_declaration)$")
                .expect("static regex"),
            SemanticClass::DefinitionType,
        ),
        (
            Regex::new(r"^(import_statement|export_statement)$").expect("static regex"),
            SemanticClass::BoundaryImport,
        ),
        (
            Regex::new(r"^(lexical_declaration|variable_declaration)$").expect("static regex"),
            SemanticClass::DefinitionValue,
        ),
    ];

    static ref GO_GROUPS: Vec<(Regex, SemanticClass)> = vec![
        (
            Regex::new(r"^(function_declaration|method_declaration|func_literal)$")
                .expect("static regex"),
            SemanticClass::DefinitionCallable,
        ),
        (
            Regex::new(r"^(type_declaration|struct_type|interface_type)$").expect("static regex"),
            SemanticClass::DefinitionType,
        ),
        (
            Regex::new(r"^(import_declaration|package_clause)$").expect("static regex"),
            SemanticClass::BoundaryImport,
        ),
        (
            Regex::new(r"^(go_statement|select_statement|defer_statement)$").expect("static regex"),
            SemanticClass::FlowError,
        ),
    ];

    static ref C_FAMILY_GROUPS: Vec<(Regex, SemanticClass)> = vec![
        (
            Regex::new(r"^(function_definition|function_declarator)$").expect("static regex"),
            SemanticClass::DefinitionCallable,
        ),
        (
            Regex::new(r"^(struct_specifier|enum_specifier|union_specifier|class_specifier|type_definition)$")
                .expect("static regex"),
            SemanticClass::DefinitionType,
        ),
        (
            Regex::new(r"^(preproc_include|preproc_def)$").expect("static regex"),
            SemanticClass::BoundaryImport,
        ),
    ];

    static ref TOKEN_COMMENT: Regex = Regex::new(r"comment").expect("static regex");
    static ref TOKEN_LITERAL: Regex = Regex::new(
        r"(string|number|integer|float|char|boolean|true|false|null|none|nil|literal|escape_sequence|heredoc)"
    )
    .expect("static regex");
    static ref TOKEN_IDENTIFIER: Regex =
        Regex::new(r"(identifier|name|label)$").expect("static regex");
    static ref TOKEN_WORD: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static regex");
}

/// Tier 1 lookup table.
fn language_groups(
    language: SemanticSearchLanguage,
) -> Option<&'static Vec<(Regex, SemanticClass)>> {
    match language {
        SemanticSearchLanguage::Rust => Some(&RUST_GROUPS),
        SemanticSearchLanguage::Python => Some(&PYTHON_GROUPS),
        SemanticSearchLanguage::JavaScript | SemanticSearchLanguage::TypeScript => {
            Some(&JS_TS_GROUPS)
        }
        SemanticSearchLanguage::Go => Some(&GO_GROUPS),
        SemanticSearchLanguage::C
        | SemanticSearchLanguage::Cpp
        | SemanticSearchLanguage::Java
        | SemanticSearchLanguage::CSharp => Some(&C_FAMILY_GROUPS),
        _ => None,
    }
}

/// Classify a Thing name through tiers 1 and 2.
///
/// Pure function of `(name, language)`; duplicate tags are collapsed.
pub fn classify_name(name: &str, language: SemanticSearchLanguage) -> Vec<SemanticClass> {
    let mut classes = Vec::new();

    if let Some(groups) = language_groups(language) {
        for (pattern, class) in groups.iter() {
            if pattern.is_match(name) && !classes.contains(class) {
                classes.push(*class);
            }
        }
    }

    for (pattern, class) in GENERIC_GROUPS.iter() {
        if pattern.is_match(name) && !classes.contains(class) {
            classes.push(*class);
        }
    }

    classes
}

/// Classify a Thing through all three tiers.
///
/// Tier 3 examines the Thing itself: token purposes map straight to syntax
/// classes, file roots are module boundaries, and composites whose names
/// end in `_invocation`/`_call` without a `body` role are call sites even
/// when a declaration shares the prefix.
pub fn classify_thing(thing: &Thing, has_body_role: bool) -> Vec<SemanticClass> {
    let mut classes = classify_name(&thing.name, thing.language);

    // Tier 3: predicates on the Thing itself.
    if let Some(purpose) = thing.purpose() {
        let tag = match purpose {
            TokenPurpose::Comment => Some(SemanticClass::SyntaxComment),
            TokenPurpose::Identifier => Some(SemanticClass::SyntaxIdentifier),
            TokenPurpose::Literal => Some(SemanticClass::SyntaxLiteral),
            TokenPurpose::Punctuation => Some(SemanticClass::SyntaxOperator),
            TokenPurpose::Keyword => None,
        };
        if let Some(tag) = tag {
            if !classes.contains(&tag) {
                classes.push(tag);
            }
        }
    }

    if thing.is_file() && !classes.contains(&SemanticClass::BoundaryModule) {
        classes.push(SemanticClass::BoundaryModule);
    }

    if thing.is_composite()
        && (thing.name.ends_with("_invocation") || thing.name.ends_with("_call"))
    {
        // A declaration carries a body; a call site does not.
        let tag = if has_body_role {
            SemanticClass::DefinitionCallable
        } else {
            SemanticClass::Invocation
        };
        if !classes.contains(&tag) {
            classes.push(tag);
        }
    }

    classes
}

/// Classify a leaf token's purpose from its name.
pub fn token_purpose(name: &str, is_named: bool) -> TokenPurpose {
    if TOKEN_COMMENT.is_match(name) {
        return TokenPurpose::Comment;
    }
    if TOKEN_LITERAL.is_match(name) {
        return TokenPurpose::Literal;
    }
    if is_named && TOKEN_IDENTIFIER.is_match(name) {
        return TokenPurpose::Identifier;
    }
    if TOKEN_WORD.is_match(name) {
        return TokenPurpose::Keyword;
    }
    TokenPurpose::Punctuation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_groups() {
        assert!(
            classify_name("function_definition", SemanticSearchLanguage::Python)
                .contains(&SemanticClass::DefinitionCallable)
        );
        assert!(
            classify_name("struct_item", SemanticSearchLanguage::Rust)
                .contains(&SemanticClass::DefinitionType)
        );
        assert!(
            classify_name("if_expression", SemanticSearchLanguage::Rust)
                .contains(&SemanticClass::FlowBranching)
        );
        assert!(
            classify_name("line_comment", SemanticSearchLanguage::Rust)
                .contains(&SemanticClass::SyntaxComment)
        );
    }

    #[test]
    fn test_language_specific_tier_runs_first() {
        // arrow_function matches no generic pattern; tier 1 catches it
        let classes = classify_name("arrow_function", SemanticSearchLanguage::JavaScript);
        assert!(classes.contains(&SemanticClass::DefinitionCallable));

        // Same name in a language without the group yields nothing
        let classes = classify_name("arrow_function", SemanticSearchLanguage::Bash);
        assert!(classes.is_empty());
    }

    #[test]
    fn test_classification_is_best_effort() {
        assert!(classify_name("block", SemanticSearchLanguage::Rust).is_empty());
    }

    #[test]
    fn test_constructor_predicate_disambiguates() {
        let invocation = Thing::composite("constructor_invocation", SemanticSearchLanguage::Java, false);
        let classes = classify_thing(&invocation, false);
        assert!(classes.contains(&SemanticClass::Invocation));
        assert!(!classes.contains(&SemanticClass::DefinitionCallable));

        let declaration = Thing::composite("constructor_invocation", SemanticSearchLanguage::Java, false);
        let classes = classify_thing(&declaration, true);
        assert!(classes.contains(&SemanticClass::DefinitionCallable));
    }

    #[test]
    fn test_file_root_is_module_boundary() {
        let root = Thing::composite("source_file", SemanticSearchLanguage::Rust, true);
        assert!(classify_thing(&root, false).contains(&SemanticClass::BoundaryModule));
    }

    #[test]
    fn test_token_purposes() {
        assert_eq!(token_purpose("line_comment", true), TokenPurpose::Comment);
        assert_eq!(token_purpose("string_literal", true), TokenPurpose::Literal);
        assert_eq!(token_purpose("identifier", true), TokenPurpose::Identifier);
        assert_eq!(token_purpose("return", false), TokenPurpose::Keyword);
        assert_eq!(token_purpose("{", false), TokenPurpose::Punctuation);
    }

    #[test]
    fn test_importance_scores_bounded() {
        for class in [
            SemanticClass::DefinitionCallable,
            SemanticClass::FlowError,
            SemanticClass::SyntaxOperator,
        ] {
            let scores = class.importance_scores();
            for task in [
                AgentTask::Default,
                AgentTask::Comprehension,
                AgentTask::Generation,
                AgentTask::Debugging,
                AgentTask::Documentation,
            ] {
                let adjusted = scores.for_task(task);
                for value in [
                    adjusted.discovery,
                    adjusted.comprehension,
                    adjusted.modification,
                    adjusted.debugging,
                ] {
                    assert!((0.0..=1.0).contains(&value));
                }
            }
        }
    }

    #[test]
    fn test_debugging_task_emphasizes_debugging() {
        let scores = SemanticClass::FlowError.importance_scores();
        let adjusted = scores.for_task(AgentTask::Debugging);
        assert!(adjusted.debugging >= adjusted.discovery);
    }
}
