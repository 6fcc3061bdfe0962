//! Process-wide grammar registry
//!
//! The registry owns every Thing, Category, and Connection per language and
//! hands out shared references, resolving the name-based indirection between
//! Things and Categories without ownership cycles.
//!
//! Loading from a grammar's node-type descriptor is single-pass,
//! deterministic, and idempotent: loading the same language twice is a
//! no-op.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use crate::classify::{classify_thing, token_purpose};
use crate::error::{GrammarError, GrammarResult};
use crate::language::SemanticSearchLanguage;
use crate::node_types::{NodeTypeDto, parse_node_types};
use crate::things::{
    Category, Connection, DirectConnection, PositionalConnections, Thing, normalize_name,
};
use crate::SemanticClass;

type LangKey = (SemanticSearchLanguage, String);

#[derive(Default)]
struct Inner {
    things: HashMap<LangKey, Arc<Thing>>,
    categories: HashMap<LangKey, Arc<Category>>,
    direct: HashMap<LangKey, Vec<Arc<DirectConnection>>>,
    positional: HashMap<LangKey, Arc<PositionalConnections>>,
    loaded: HashSet<SemanticSearchLanguage>,
}

/// Registry of grammar models, indexed by language.
#[derive(Default)]
pub struct GrammarRegistry {
    inner: RwLock<Inner>,
}

impl GrammarRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Thing. Later registrations of the same name replace
    /// earlier ones (descriptor reloads are idempotent).
    pub fn register_thing(&self, thing: Thing) {
        let key = (thing.language, thing.name.clone());
        if let Ok(mut inner) = self.inner.write() {
            inner.things.insert(key, Arc::new(thing));
        }
    }

    /// Register a connection.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::MissingRole`] for a direct connection with an
    /// empty role, and [`GrammarError::UnknownThing`] when the source Thing
    /// has not been registered.
    pub fn register_connection(&self, connection: Connection) -> GrammarResult<()> {
        let language = connection.language();
        let source = normalize_name(connection.source_thing());

        let mut inner = self
            .inner
            .write()
            .map_err(|_| GrammarError::Other("registry lock poisoned".to_string()))?;

        if !inner.things.contains_key(&(language, source.clone())) {
            return Err(GrammarError::UnknownThing {
                thing: source,
                language: language.to_string(),
            });
        }

        match connection {
            Connection::Direct(conn) => {
                if conn.role.trim().is_empty() {
                    return Err(GrammarError::MissingRole { thing: source });
                }
                inner
                    .direct
                    .entry((language, source))
                    .or_default()
                    .push(Arc::new(conn));
            }
            Connection::Positional(conn) => {
                inner.positional.insert((language, source), Arc::new(conn));
            }
        }

        Ok(())
    }

    /// Look up a Thing by name. Without a language the first match across
    /// languages (in language declaration order) is returned.
    pub fn get_thing_by_name(
        &self,
        name: &str,
        language: Option<SemanticSearchLanguage>,
    ) -> Option<Arc<Thing>> {
        let name = normalize_name(name);
        let inner = self.inner.read().ok()?;
        match language {
            Some(language) => inner.things.get(&(language, name)).cloned(),
            None => SemanticSearchLanguage::ALL
                .into_iter()
                .find_map(|lang| inner.things.get(&(lang, name.clone())).cloned()),
        }
    }

    /// Look up a Category by name and language.
    pub fn get_category_by_name(
        &self,
        name: &str,
        language: SemanticSearchLanguage,
    ) -> Option<Arc<Category>> {
        let inner = self.inner.read().ok()?;
        inner
            .categories
            .get(&(language, normalize_name(name)))
            .cloned()
    }

    /// All direct (named-role) connections from a source Thing.
    pub fn get_direct_connections_by_source(
        &self,
        name: &str,
        language: SemanticSearchLanguage,
    ) -> Vec<Arc<DirectConnection>> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.direct.get(&(language, normalize_name(name))).cloned())
            .unwrap_or_default()
    }

    /// The positional (ordered) connections from a source Thing.
    pub fn get_positional_connections_by_source(
        &self,
        name: &str,
        language: SemanticSearchLanguage,
    ) -> Option<Arc<PositionalConnections>> {
        self.inner
            .read()
            .ok()?
            .positional
            .get(&(language, normalize_name(name)))
            .cloned()
    }

    /// Names of all categories for a language.
    pub fn category_names(&self, language: SemanticSearchLanguage) -> Vec<String> {
        self.inner
            .read()
            .map(|inner| {
                let mut names: Vec<String> = inner
                    .categories
                    .keys()
                    .filter(|(lang, _)| *lang == language)
                    .map(|(_, name)| name.clone())
                    .collect();
                names.sort();
                names
            })
            .unwrap_or_default()
    }

    /// Whether a language's grammar has been loaded.
    pub fn is_loaded(&self, language: SemanticSearchLanguage) -> bool {
        self.inner
            .read()
            .map(|inner| inner.loaded.contains(&language))
            .unwrap_or(false)
    }

    /// Load a language's grammar model from its node-type descriptor.
    ///
    /// Idempotent: a second call for the same language returns immediately.
    ///
    /// # Errors
    ///
    /// Returns a parse error when the bundled descriptor is malformed.
    pub fn ensure_language(&self, language: SemanticSearchLanguage) -> GrammarResult<()> {
        if self.is_loaded(language) {
            return Ok(());
        }
        let dtos = parse_node_types(language, language.node_types_json())?;
        self.load_from_dtos(language, &dtos)
    }

    /// Load a grammar model from parsed descriptors. Used directly by tests
    /// with synthetic descriptors; `ensure_language` is the production path.
    pub fn load_from_dtos(
        &self,
        language: SemanticSearchLanguage,
        dtos: &[NodeTypeDto],
    ) -> GrammarResult<()> {
        // Categories first, so Things can record their memberships in the
        // same pass.
        let mut categories: Vec<Category> = Vec::new();
        let mut membership: HashMap<String, Vec<String>> = HashMap::new();

        for dto in dtos.iter().filter(|d| d.is_supertype()) {
            let members: Vec<String> = dto.subtypes.iter().map(|s| s.kind.clone()).collect();
            for member in &members {
                membership
                    .entry(normalize_name(member))
                    .or_default()
                    .push(normalize_name(&dto.kind));
            }
            categories.push(Category::new(&dto.kind, language, members));
        }

        let mut things: Vec<Thing> = Vec::new();
        for dto in dtos.iter().filter(|d| !d.is_supertype()) {
            let mut thing = if dto.is_leaf() {
                Thing::token(
                    &dto.kind,
                    language,
                    token_purpose(&dto.kind, dto.named),
                    dto.named,
                )
            } else {
                Thing::composite(&dto.kind, language, dto.is_root())
            };
            thing.can_be_anywhere = dto.extra;
            if let Some(category_names) = membership.get(&thing.name) {
                thing.categories = category_names.iter().cloned().collect();
            }
            things.push(thing);
        }

        {
            let mut inner = self
                .inner
                .write()
                .map_err(|_| GrammarError::Other("registry lock poisoned".to_string()))?;
            if inner.loaded.contains(&language) {
                return Ok(());
            }
            for category in categories {
                inner
                    .categories
                    .insert((language, category.name.clone()), Arc::new(category));
            }
            for thing in things {
                inner
                    .things
                    .insert((language, thing.name.clone()), Arc::new(thing));
            }
            inner.loaded.insert(language);
        }

        // Connections go through the public path so role/source invariants
        // are enforced in one place.
        for dto in dtos.iter().filter(|d| !d.is_supertype() && !d.is_leaf()) {
            for (role, spec) in &dto.fields {
                self.register_connection(Connection::Direct(DirectConnection {
                    source_thing: normalize_name(&dto.kind),
                    role: role.clone(),
                    target_thing_names: spec
                        .types
                        .iter()
                        .map(|t| normalize_name(&t.kind))
                        .collect(),
                    allows_multiple: spec.multiple,
                    requires_presence: spec.required,
                    language,
                }))?;
            }
            if let Some(children) = &dto.children {
                self.register_connection(Connection::Positional(PositionalConnections {
                    source_thing: normalize_name(&dto.kind),
                    target_thing_names: children
                        .types
                        .iter()
                        .map(|t| normalize_name(&t.kind))
                        .collect(),
                    allows_multiple: children.multiple,
                    requires_presence: children.required,
                    language,
                }))?;
            }
        }

        tracing::debug!(language = %language, "Grammar model loaded");
        Ok(())
    }

    /// Classify a Thing through all three tiers, consulting the Thing's
    /// registered connections for the tier-3 predicates.
    pub fn semantic_classes_for(
        &self,
        name: &str,
        language: SemanticSearchLanguage,
    ) -> Vec<SemanticClass> {
        let Some(thing) = self.get_thing_by_name(name, Some(language)) else {
            return crate::classify::classify_name(&normalize_name(name), language);
        };
        let has_body_role = self
            .get_direct_connections_by_source(&thing.name, language)
            .iter()
            .any(|conn| conn.role == "body");
        classify_thing(&thing, has_body_role)
    }
}

static DEFAULT_REGISTRY: OnceLock<GrammarRegistry> = OnceLock::new();

/// The process-wide default registry.
///
/// Lifetimes stay explicit: pipeline components take `&GrammarRegistry` and
/// this accessor exists for ergonomic call sites that use the default
/// context.
pub fn default_registry() -> &'static GrammarRegistry {
    DEFAULT_REGISTRY.get_or_init(GrammarRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::things::TokenPurpose;

    fn sample_dtos() -> Vec<NodeTypeDto> {
        let json = r#"[
            {
                "type": "_declaration",
                "named": true,
                "subtypes": [
                    {"type": "function_item", "named": true},
                    {"type": "struct_item", "named": true}
                ]
            },
            {
                "type": "source_file",
                "named": true,
                "root": true,
                "children": {
                    "multiple": true,
                    "required": false,
                    "types": [{"type": "_declaration", "named": true}]
                }
            },
            {
                "type": "function_item",
                "named": true,
                "fields": {
                    "name": {
                        "multiple": false,
                        "required": true,
                        "types": [{"type": "identifier", "named": true}]
                    },
                    "body": {
                        "multiple": false,
                        "required": true,
                        "types": [{"type": "block", "named": true}]
                    }
                }
            },
            {
                "type": "struct_item",
                "named": true,
                "fields": {
                    "name": {
                        "multiple": false,
                        "required": true,
                        "types": [{"type": "identifier", "named": true}]
                    }
                }
            },
            {"type": "block", "named": true, "children": {
                "multiple": true,
                "required": false,
                "types": [{"type": "identifier", "named": true}]
            }},
            {"type": "identifier", "named": true},
            {"type": "line_comment", "named": true, "extra": true}
        ]"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_load_builds_model() {
        let registry = GrammarRegistry::new();
        registry
            .load_from_dtos(SemanticSearchLanguage::Rust, &sample_dtos())
            .unwrap();

        let function = registry
            .get_thing_by_name("function_item", Some(SemanticSearchLanguage::Rust))
            .unwrap();
        assert!(function.is_composite());
        assert!(function.categories.contains("_declaration"));

        let identifier = registry
            .get_thing_by_name("identifier", Some(SemanticSearchLanguage::Rust))
            .unwrap();
        assert!(identifier.is_token());
        assert_eq!(identifier.purpose(), Some(TokenPurpose::Identifier));

        let comment = registry
            .get_thing_by_name("line_comment", Some(SemanticSearchLanguage::Rust))
            .unwrap();
        assert!(comment.can_be_anywhere);

        let root = registry
            .get_thing_by_name("source_file", Some(SemanticSearchLanguage::Rust))
            .unwrap();
        assert!(root.is_file());
    }

    #[test]
    fn test_thing_categories_subset_of_registry_categories() {
        let registry = GrammarRegistry::new();
        registry
            .load_from_dtos(SemanticSearchLanguage::Rust, &sample_dtos())
            .unwrap();

        let category_names = registry.category_names(SemanticSearchLanguage::Rust);
        let function = registry
            .get_thing_by_name("function_item", Some(SemanticSearchLanguage::Rust))
            .unwrap();
        for category in &function.categories {
            assert!(category_names.contains(category));
        }
    }

    #[test]
    fn test_connections_loaded() {
        let registry = GrammarRegistry::new();
        registry
            .load_from_dtos(SemanticSearchLanguage::Rust, &sample_dtos())
            .unwrap();

        let direct = registry
            .get_direct_connections_by_source("function_item", SemanticSearchLanguage::Rust);
        assert_eq!(direct.len(), 2);
        assert!(direct.iter().all(|c| !c.role.is_empty()));
        assert!(direct.iter().any(|c| c.role == "body"));

        let positional = registry
            .get_positional_connections_by_source("source_file", SemanticSearchLanguage::Rust)
            .unwrap();
        assert!(positional.allows_multiple);
        assert!(positional.can_connect_to("_declaration"));
    }

    #[test]
    fn test_load_is_idempotent() {
        let registry = GrammarRegistry::new();
        let dtos = sample_dtos();
        registry
            .load_from_dtos(SemanticSearchLanguage::Rust, &dtos)
            .unwrap();
        let direct_before = registry
            .get_direct_connections_by_source("function_item", SemanticSearchLanguage::Rust)
            .len();

        registry
            .load_from_dtos(SemanticSearchLanguage::Rust, &dtos)
            .unwrap();
        let direct_after = registry
            .get_direct_connections_by_source("function_item", SemanticSearchLanguage::Rust)
            .len();
        assert_eq!(direct_before, direct_after);
    }

    #[test]
    fn test_connection_requires_known_source() {
        let registry = GrammarRegistry::new();
        let result = registry.register_connection(Connection::Direct(DirectConnection {
            source_thing: "ghost".to_string(),
            role: "body".to_string(),
            target_thing_names: std::collections::BTreeSet::new(),
            allows_multiple: false,
            requires_presence: false,
            language: SemanticSearchLanguage::Rust,
        }));
        assert!(matches!(result, Err(GrammarError::UnknownThing { .. })));
    }

    #[test]
    fn test_direct_connection_requires_role() {
        let registry = GrammarRegistry::new();
        registry.register_thing(Thing::composite(
            "call_expression",
            SemanticSearchLanguage::Rust,
            false,
        ));
        let result = registry.register_connection(Connection::Direct(DirectConnection {
            source_thing: "call_expression".to_string(),
            role: "  ".to_string(),
            target_thing_names: std::collections::BTreeSet::new(),
            allows_multiple: false,
            requires_presence: false,
            language: SemanticSearchLanguage::Rust,
        }));
        assert!(matches!(result, Err(GrammarError::MissingRole { .. })));
    }

    #[test]
    fn test_semantic_classes_via_registry() {
        let registry = GrammarRegistry::new();
        registry
            .load_from_dtos(SemanticSearchLanguage::Rust, &sample_dtos())
            .unwrap();

        let classes =
            registry.semantic_classes_for("function_item", SemanticSearchLanguage::Rust);
        assert!(classes.contains(&SemanticClass::DefinitionCallable));

        let classes = registry.semantic_classes_for("source_file", SemanticSearchLanguage::Rust);
        assert!(classes.contains(&SemanticClass::BoundaryModule));
    }

    #[test]
    fn test_ensure_language_loads_real_grammar() {
        let registry = GrammarRegistry::new();
        registry
            .ensure_language(SemanticSearchLanguage::Rust)
            .unwrap();
        assert!(registry.is_loaded(SemanticSearchLanguage::Rust));
        assert!(
            registry
                .get_thing_by_name("function_item", Some(SemanticSearchLanguage::Rust))
                .is_some()
        );
    }
}
