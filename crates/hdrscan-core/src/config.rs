//! Parser configuration
//!
//! Everything platform-dependent about the parser is data: the primitive
//! type spellings, the qualifier and modifier keyword lists, the
//! attribute-macro replacement table, and the header search path. A
//! process-wide defaults registry lets embedders install a baseline once
//! and lets tests restore it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

/// Text encoding of input header files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Strict UTF-8; invalid bytes are a fatal decode error
    Utf8,
    /// UTF-8 with invalid sequences replaced
    Utf8Lossy,
    /// ISO-8859-1, one byte per char
    Latin1,
}

/// hdrscan parser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Directories searched, in order, for headers given by bare name
    pub header_search_paths: Vec<PathBuf>,

    /// Input text encoding
    pub encoding: Encoding,

    /// Recognized primitive type spellings
    pub primitive_types: Vec<String>,

    /// Recognized type qualifier keywords
    pub type_qualifiers: Vec<String>,

    /// Recognized modifier keywords (calling conventions, attributes)
    pub modifiers: Vec<String>,

    /// Regex replacements applied to source text before parsing,
    /// e.g. `__declspec\(\w+\)` -> ``
    pub replacements: Vec<(String, String)>,

    /// Cap on macro expansions triggered by a single substitution pass
    pub max_expansion: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            header_search_paths: vec![],
            encoding: Encoding::Utf8,
            primitive_types: [
                "void", "char", "bool", "_Bool", "int", "float", "double", "wchar_t", "size_t",
                "ssize_t", "time_t", "int8_t", "uint8_t", "int16_t", "uint16_t", "int32_t",
                "uint32_t", "int64_t", "uint64_t",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            type_qualifiers: ["const", "volatile", "restrict", "near", "far"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            modifiers: ["__cdecl", "__stdcall", "__fastcall", "__declspec"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            replacements: vec![],
            max_expansion: 4096,
        }
    }
}

impl ParserConfig {
    /// Is `word` a recognized primitive type spelling?
    pub fn is_primitive(&self, word: &str) -> bool {
        self.primitive_types.iter().any(|t| t == word)
    }

    /// Is `word` a recognized type qualifier?
    pub fn is_qualifier(&self, word: &str) -> bool {
        self.type_qualifiers.iter().any(|q| q == word)
    }

    /// Is `word` a recognized modifier (calling convention, attribute)?
    pub fn is_modifier(&self, word: &str) -> bool {
        self.modifiers.iter().any(|m| m == word)
    }
}

static DEFAULTS: RwLock<Option<ParserConfig>> = RwLock::new(None);

/// Install process-wide default configuration.
pub fn init_defaults(config: ParserConfig) {
    *DEFAULTS.write().expect("config registry poisoned") = Some(config);
}

/// Drop any installed defaults, restoring the built-in baseline.
pub fn reset_defaults() {
    *DEFAULTS.write().expect("config registry poisoned") = None;
}

/// The current process-wide defaults (built-in baseline if none installed).
pub fn current_defaults() -> ParserConfig {
    DEFAULTS
        .read()
        .expect("config registry poisoned")
        .clone()
        .unwrap_or_default()
}
