//! Language identification
//!
//! Each supported language carries a canonical extension set, a structural
//! fingerprint (its unique named-node count), and a set of config-file
//! recognizers. A file's language is resolved by extension lookup first,
//! fingerprint second, config-file pattern last. Ambiguous config names
//! (`Makefile` could be C or C++) resolve by the fixed precedence encoded
//! in [`CONFIG_FILE_RECOGNIZERS`]; nothing is guessed per-file at runtime.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Language;

/// Languages with full tree-sitter support for semantic search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticSearchLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    C,
    Cpp,
    Java,
    CSharp,
    Json,
    Xml,
    Yaml,
    Bash,
    Html,
    PowerShell,
    Sql,
}

/// Config-oriented languages, tracked separately so search responses can
/// exclude them from `languages_found`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLanguage {
    Json,
    Yaml,
    Toml,
    Xml,
    Ini,
}

impl ConfigLanguage {
    /// Extensions recognized for this config language.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Json => &["json", "jsonc", "json5"],
            Self::Yaml => &["yaml", "yml"],
            Self::Toml => &["toml"],
            Self::Xml => &["xml", "xsl", "xslt"],
            Self::Ini => &["ini", "cfg", "conf"],
        }
    }

    /// Resolve from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        [Self::Json, Self::Yaml, Self::Toml, Self::Xml, Self::Ini]
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }
}

/// A config-file recognizer: an exact file name (or suffix pattern starting
/// with `*`) mapped to the language whose tooling owns that file.
#[derive(Debug, Clone, Copy)]
pub struct LanguageConfigFile {
    pub pattern: &'static str,
    pub language: SemanticSearchLanguage,
}

/// Config-file recognizers in precedence order: the first match wins.
///
/// `Makefile` is claimed by C (not C++) by this ordering; projects that want
/// C++ treatment use `CMakeLists.txt`, listed explicitly.
pub const CONFIG_FILE_RECOGNIZERS: &[LanguageConfigFile] = &[
    LanguageConfigFile {
        pattern: "Cargo.toml",
        language: SemanticSearchLanguage::Rust,
    },
    LanguageConfigFile {
        pattern: "Cargo.lock",
        language: SemanticSearchLanguage::Rust,
    },
    LanguageConfigFile {
        pattern: "pyproject.toml",
        language: SemanticSearchLanguage::Python,
    },
    LanguageConfigFile {
        pattern: "requirements.txt",
        language: SemanticSearchLanguage::Python,
    },
    LanguageConfigFile {
        pattern: "setup.py",
        language: SemanticSearchLanguage::Python,
    },
    LanguageConfigFile {
        pattern: "tsconfig.json",
        language: SemanticSearchLanguage::TypeScript,
    },
    LanguageConfigFile {
        pattern: "package.json",
        language: SemanticSearchLanguage::JavaScript,
    },
    LanguageConfigFile {
        pattern: "go.mod",
        language: SemanticSearchLanguage::Go,
    },
    LanguageConfigFile {
        pattern: "go.sum",
        language: SemanticSearchLanguage::Go,
    },
    LanguageConfigFile {
        pattern: "pom.xml",
        language: SemanticSearchLanguage::Java,
    },
    LanguageConfigFile {
        pattern: "build.gradle",
        language: SemanticSearchLanguage::Java,
    },
    LanguageConfigFile {
        pattern: "*.csproj",
        language: SemanticSearchLanguage::CSharp,
    },
    LanguageConfigFile {
        pattern: "*.sln",
        language: SemanticSearchLanguage::CSharp,
    },
    LanguageConfigFile {
        pattern: "CMakeLists.txt",
        language: SemanticSearchLanguage::Cpp,
    },
    // Makefiles are ambiguous between C and C++; C wins by precedence.
    LanguageConfigFile {
        pattern: "Makefile",
        language: SemanticSearchLanguage::C,
    },
    LanguageConfigFile {
        pattern: "makefile",
        language: SemanticSearchLanguage::C,
    },
];

impl SemanticSearchLanguage {
    /// All supported languages.
    pub const ALL: [Self; 16] = [
        Self::Rust,
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Go,
        Self::C,
        Self::Cpp,
        Self::Java,
        Self::CSharp,
        Self::Json,
        Self::Xml,
        Self::Yaml,
        Self::Bash,
        Self::Html,
        Self::PowerShell,
        Self::Sql,
    ];

    /// Canonical lowercase name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::CSharp => "c_sharp",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Yaml => "yaml",
            Self::Bash => "bash",
            Self::Html => "html",
            Self::PowerShell => "powershell",
            Self::Sql => "sql",
        }
    }

    /// Parse from a canonical or common alias name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Some(Self::Rust),
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "typescript" | "ts" => Some(Self::TypeScript),
            "go" | "golang" => Some(Self::Go),
            "c" => Some(Self::C),
            "cpp" | "c++" | "cxx" => Some(Self::Cpp),
            "java" => Some(Self::Java),
            "c_sharp" | "csharp" | "c#" => Some(Self::CSharp),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "yaml" | "yml" => Some(Self::Yaml),
            "bash" | "sh" | "shell" => Some(Self::Bash),
            "html" => Some(Self::Html),
            "powershell" | "pwsh" => Some(Self::PowerShell),
            "sql" => Some(Self::Sql),
            _ => None,
        }
    }

    /// Canonical file extensions for this language.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["rs"],
            Self::Python => &["py", "pyw", "pyi"],
            Self::JavaScript => &["js", "mjs", "cjs", "jsx"],
            Self::TypeScript => &["ts", "tsx", "mts", "cts"],
            Self::Go => &["go"],
            Self::C => &["c", "h"],
            Self::Cpp => &["cpp", "cxx", "cc", "hpp", "hxx", "hh"],
            Self::Java => &["java"],
            Self::CSharp => &["cs", "csx"],
            Self::Json => &["json", "jsonc"],
            Self::Xml => &["xml", "xsl", "xslt", "svg"],
            Self::Yaml => &["yaml", "yml"],
            Self::Bash => &["sh", "bash", "zsh"],
            Self::Html => &["html", "htm", "xhtml"],
            Self::PowerShell => &["ps1", "psm1", "psd1"],
            Self::Sql => &["sql"],
        }
    }

    /// Resolve a language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Structural fingerprint: the count of top-level named nodes in the
    /// language's grammar. Unique per grammar where known; used to identify
    /// a language from a parse tree when extensions are missing or lie.
    pub fn named_node_count(self) -> Option<usize> {
        match self {
            Self::Cpp => Some(231),
            Self::CSharp => Some(221),
            Self::TypeScript => Some(192),
            Self::Rust => Some(170),
            Self::Java => Some(152),
            Self::C => Some(133),
            Self::Python => Some(130),
            Self::JavaScript => Some(120),
            Self::Go => Some(113),
            Self::Bash => Some(63),
            Self::Html => Some(20),
            Self::Json => Some(14),
            Self::Yaml => Some(6),
            // XML, PowerShell, and SQL grammars have no stable published
            // fingerprint; extension lookup always resolves them.
            Self::Xml | Self::PowerShell | Self::Sql => None,
        }
    }

    /// Resolve a language from a structural fingerprint.
    pub fn from_named_node_count(count: usize) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.named_node_count() == Some(count))
    }

    /// Whether this language is config-oriented (excluded from search
    /// response language lists).
    pub fn is_config_language(self) -> bool {
        matches!(self, Self::Json | Self::Yaml | Self::Xml)
    }

    /// The config-language view of this language, if it has one.
    pub fn as_config_language(self) -> Option<ConfigLanguage> {
        match self {
            Self::Json => Some(ConfigLanguage::Json),
            Self::Yaml => Some(ConfigLanguage::Yaml),
            Self::Xml => Some(ConfigLanguage::Xml),
            _ => None,
        }
    }

    /// The tree-sitter grammar for this language.
    pub fn tree_sitter_language(self) -> Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Json => tree_sitter_json::LANGUAGE.into(),
            Self::Xml => tree_sitter_xml::LANGUAGE_XML.into(),
            Self::Yaml => tree_sitter_yaml::LANGUAGE.into(),
            Self::Bash => tree_sitter_bash::LANGUAGE.into(),
            Self::Html => tree_sitter_html::LANGUAGE.into(),
            Self::PowerShell => tree_sitter_powershell::LANGUAGE.into(),
            Self::Sql => tree_sitter_sequel::LANGUAGE.into(),
        }
    }

    /// The grammar's node-type descriptor JSON, as shipped by the grammar
    /// crate. Drives the grammar-model loader.
    pub fn node_types_json(self) -> &'static str {
        match self {
            Self::Rust => tree_sitter_rust::NODE_TYPES,
            Self::Python => tree_sitter_python::NODE_TYPES,
            Self::JavaScript => tree_sitter_javascript::NODE_TYPES,
            Self::TypeScript => tree_sitter_typescript::TYPESCRIPT_NODE_TYPES,
            Self::Go => tree_sitter_go::NODE_TYPES,
            Self::C => tree_sitter_c::NODE_TYPES,
            Self::Cpp => tree_sitter_cpp::NODE_TYPES,
            Self::Java => tree_sitter_java::NODE_TYPES,
            Self::CSharp => tree_sitter_c_sharp::NODE_TYPES,
            Self::Json => tree_sitter_json::NODE_TYPES,
            Self::Xml => tree_sitter_xml::XML_NODE_TYPES,
            Self::Yaml => tree_sitter_yaml::NODE_TYPES,
            Self::Bash => tree_sitter_bash::NODE_TYPES,
            Self::Html => tree_sitter_html::NODE_TYPES,
            Self::PowerShell => tree_sitter_powershell::NODE_TYPES,
            Self::Sql => tree_sitter_sequel::NODE_TYPES,
        }
    }

    /// Resolve a language from a config file name, by recognizer precedence.
    pub fn from_config_file(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        CONFIG_FILE_RECOGNIZERS
            .iter()
            .find(|recognizer| {
                if let Some(suffix) = recognizer.pattern.strip_prefix('*') {
                    file_name.ends_with(suffix)
                } else {
                    file_name == recognizer.pattern
                }
            })
            .map(|recognizer| recognizer.language)
    }

    /// Full identification chain for a file: extension lookup, then
    /// structural fingerprint (when the caller parsed the file already),
    /// then config-file recognizers.
    pub fn identify(path: &Path, fingerprint: Option<usize>) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(lang) = Self::from_extension(ext) {
                return Some(lang);
            }
        }
        if let Some(count) = fingerprint {
            if let Some(lang) = Self::from_named_node_count(count) {
                return Some(lang);
            }
        }
        Self::from_config_file(path)
    }
}

impl std::fmt::Display for SemanticSearchLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(
            SemanticSearchLanguage::from_extension("rs"),
            Some(SemanticSearchLanguage::Rust)
        );
        assert_eq!(
            SemanticSearchLanguage::from_extension("PY"),
            Some(SemanticSearchLanguage::Python)
        );
        assert_eq!(SemanticSearchLanguage::from_extension("zig"), None);
    }

    #[test]
    fn test_extensions_do_not_collide() {
        let mut seen = HashSet::new();
        for lang in SemanticSearchLanguage::ALL {
            for ext in lang.extensions() {
                assert!(seen.insert(*ext), "extension {ext} claimed twice");
            }
        }
    }

    #[test]
    fn test_fingerprints_are_unique() {
        let mut seen = HashSet::new();
        for lang in SemanticSearchLanguage::ALL {
            if let Some(count) = lang.named_node_count() {
                assert!(seen.insert(count), "fingerprint {count} claimed twice");
            }
        }
    }

    #[test]
    fn test_makefile_precedence_is_c() {
        let path = PathBuf::from("project/Makefile");
        assert_eq!(
            SemanticSearchLanguage::from_config_file(&path),
            Some(SemanticSearchLanguage::C)
        );
    }

    #[test]
    fn test_config_suffix_pattern() {
        let path = PathBuf::from("src/App.csproj");
        assert_eq!(
            SemanticSearchLanguage::from_config_file(&path),
            Some(SemanticSearchLanguage::CSharp)
        );
    }

    #[test]
    fn test_identify_chain_prefers_extension() {
        // A .rs file named Makefile-ish still identifies as Rust
        let path = PathBuf::from("Makefile.rs");
        assert_eq!(
            SemanticSearchLanguage::identify(&path, Some(130)),
            Some(SemanticSearchLanguage::Rust)
        );
    }

    #[test]
    fn test_identify_falls_back_to_fingerprint() {
        let path = PathBuf::from("strange_file.xyz");
        assert_eq!(
            SemanticSearchLanguage::identify(&path, Some(130)),
            Some(SemanticSearchLanguage::Python)
        );
    }

    #[test]
    fn test_identify_falls_back_to_config_recognizer() {
        let path = PathBuf::from("Cargo.lock");
        assert_eq!(
            SemanticSearchLanguage::identify(&path, None),
            Some(SemanticSearchLanguage::Rust)
        );
    }

    #[test]
    fn test_config_language_flags() {
        assert!(SemanticSearchLanguage::Json.is_config_language());
        assert!(SemanticSearchLanguage::Yaml.is_config_language());
        assert!(!SemanticSearchLanguage::Rust.is_config_language());
        assert_eq!(
            SemanticSearchLanguage::Json.as_config_language(),
            Some(ConfigLanguage::Json)
        );
    }
}
