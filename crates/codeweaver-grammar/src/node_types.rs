//! Node-type descriptor parsing
//!
//! Each tree-sitter grammar crate ships a `node-types.json` describing every
//! rule in the grammar: supertypes with their subtypes, composites with
//! named fields and ordered children, and leaf tokens. These DTOs mirror
//! that document; the registry loader turns them into the grammar model.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{GrammarError, GrammarResult};
use crate::language::SemanticSearchLanguage;

/// A reference to another node type inside a descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub named: bool,
}

/// The child constraint of a field or of the positional children block.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildSpec {
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub types: Vec<NodeRef>,
}

/// One entry of `node-types.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeTypeDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub named: bool,
    /// Marks the grammar's root rule (newer descriptors only)
    #[serde(default)]
    pub root: bool,
    /// Marks "extra" nodes that may appear anywhere (comments)
    #[serde(default)]
    pub extra: bool,
    /// Present on supertypes
    #[serde(default)]
    pub subtypes: Vec<NodeRef>,
    /// Named-field edges
    #[serde(default)]
    pub fields: BTreeMap<String, ChildSpec>,
    /// Ordered, unnamed child edge
    #[serde(default)]
    pub children: Option<ChildSpec>,
}

impl NodeTypeDto {
    /// A supertype entry describes a Category.
    pub fn is_supertype(&self) -> bool {
        !self.subtypes.is_empty()
    }

    /// A named entry with no fields and no children is a leaf Token.
    pub fn is_leaf(&self) -> bool {
        !self.is_supertype() && self.fields.is_empty() && self.children.is_none()
    }
}

/// Root-rule names used when the descriptor predates the `root` flag.
const KNOWN_ROOT_NAMES: &[&str] = &[
    "source_file",
    "program",
    "module",
    "translation_unit",
    "compilation_unit",
    "document",
    "stream",
    "fragment",
];

impl NodeTypeDto {
    /// Whether this entry is the file root, from the flag or the fallback
    /// name list.
    pub fn is_root(&self) -> bool {
        self.root || KNOWN_ROOT_NAMES.contains(&self.kind.as_str())
    }
}

/// Parse a grammar's node-type descriptor document.
///
/// # Errors
///
/// Returns [`GrammarError::NodeTypeParse`] when the JSON is malformed.
pub fn parse_node_types(
    language: SemanticSearchLanguage,
    json: &str,
) -> GrammarResult<Vec<NodeTypeDto>> {
    serde_json::from_str(json).map_err(|source| GrammarError::NodeTypeParse {
        language: language.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "type": "_expression",
            "named": true,
            "subtypes": [
                {"type": "call_expression", "named": true},
                {"type": "identifier", "named": true}
            ]
        },
        {
            "type": "source_file",
            "named": true,
            "root": true,
            "children": {
                "multiple": true,
                "required": false,
                "types": [{"type": "_expression", "named": true}]
            }
        },
        {
            "type": "call_expression",
            "named": true,
            "fields": {
                "function": {
                    "multiple": false,
                    "required": true,
                    "types": [{"type": "identifier", "named": true}]
                }
            }
        },
        {"type": "identifier", "named": true},
        {"type": "(", "named": false}
    ]"#;

    #[test]
    fn test_parse_sample_descriptor() {
        let dtos = parse_node_types(SemanticSearchLanguage::Rust, SAMPLE).unwrap();
        assert_eq!(dtos.len(), 5);

        let supertype = &dtos[0];
        assert!(supertype.is_supertype());
        assert_eq!(supertype.subtypes.len(), 2);

        let root = &dtos[1];
        assert!(root.is_root());
        assert!(!root.is_leaf());

        let call = &dtos[2];
        assert!(!call.is_leaf());
        assert!(call.fields.contains_key("function"));
        assert!(call.fields["function"].required);

        let ident = &dtos[3];
        assert!(ident.is_leaf());
        assert!(ident.named);

        let paren = &dtos[4];
        assert!(paren.is_leaf());
        assert!(!paren.named);
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let result = parse_node_types(SemanticSearchLanguage::Rust, "{not json");
        assert!(matches!(result, Err(GrammarError::NodeTypeParse { .. })));
    }

    #[test]
    fn test_real_rust_descriptor_parses() {
        let dtos = parse_node_types(
            SemanticSearchLanguage::Rust,
            SemanticSearchLanguage::Rust.node_types_json(),
        )
        .unwrap();
        assert!(!dtos.is_empty());
        assert!(dtos.iter().any(|d| d.kind == "function_item"));
        assert!(dtos.iter().any(NodeTypeDto::is_supertype));
    }
}
