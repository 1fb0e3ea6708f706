//! hdrscan Parser
//!
//! Extracts a queryable model of macros, typedefs, enums, structs/unions,
//! function prototypes, and global variables from C header files.
//!
//! ## Modules
//!
//! - `lexer` - token source: splicing, comment stripping, tokenizing
//! - `macros` - macro table and token substitution
//! - `preprocess` - directive walker, conditional and pack stacks
//! - `eval` - constant expression evaluation
//! - `declarations` - the C declaration grammar
//! - `canon` - typedef chain resolution
//! - `store` - the finalized definition store
//! - `cache` - persistent single-file parse cache
//!
//! `#include` is not processed; callers supply every header, in order.

pub mod cache;
pub mod canon;
pub mod declarations;
pub mod eval;
pub mod lexer;
pub mod macros;
pub mod preprocess;
pub mod store;

pub use store::{Definition, DefinitionStore, Kind, OrderedMap};

use crate::declarations::DeclParser;
use crate::eval::Evaluator;
use crate::macros::{Macro, MacroTable};
use crate::preprocess::Preprocessor;
use hdrscan_core::{
    config, Diagnostic, Encoding, Error, ObjectMacro, ParserConfig, Result, TokenKind,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The header-parsing pipeline: load files, preprocess, parse
/// declarations, finalize the store.
///
/// ```no_run
/// # use hdrscan_parser::HeaderParser;
/// let mut parser = HeaderParser::new();
/// parser.add_source("defs.h", "#define ANSWER 42\ntypedef unsigned int uint;\n");
/// let store = parser.parse().unwrap();
/// assert!(store.eval("ANSWER").is_some());
/// ```
pub struct HeaderParser {
    config: ParserConfig,
    sources: Vec<(String, String)>,
    predefines: Vec<(String, String)>,
    store: DefinitionStore,
    diagnostics: Vec<Diagnostic>,
    parsed: bool,
}

impl HeaderParser {
    /// Parser with the process-wide default configuration.
    pub fn new() -> Self {
        Self::with_config(config::current_defaults())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            predefines: Vec::new(),
            store: DefinitionStore::new(),
            diagnostics: Vec::new(),
            parsed: false,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Predefine an object-like macro before parsing, as a compiler's
    /// `-DNAME=value` would.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.predefines.push((name.into(), value.into()));
    }

    /// Add raw header text under a display name.
    pub fn add_source(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.sources.push((name.into(), text.into()));
    }

    /// Add a header file, resolving bare names against the configured
    /// search paths.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let resolved = self.resolve_header(path)?;
        let bytes = std::fs::read(&resolved)?;
        let name = resolved.to_string_lossy().into_owned();
        let text = self.decode(bytes, &name)?;
        debug!(file = %name, "loaded header");
        self.sources.push((name, text));
        Ok(())
    }

    fn resolve_header(&self, path: &Path) -> Result<PathBuf> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        for dir in &self.config.header_search_paths {
            let candidate = dir.join(path);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::FileNotFound(path.display().to_string()))
    }

    fn decode(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        match self.config.encoding {
            Encoding::Utf8 => String::from_utf8(bytes)
                .map_err(|e| Error::Decode(format!("{}: {}", name, e))),
            Encoding::Utf8Lossy => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// Parse everything that was added. Idempotent.
    pub fn parse(&mut self) -> Result<&DefinitionStore> {
        self.process_all(None)
    }

    /// Parse with an optional cache file: when the cache matches the
    /// inputs and configuration the parse is skipped entirely, otherwise
    /// the cache is rewritten after parsing.
    pub fn process_all(&mut self, cache_file: Option<&Path>) -> Result<&DefinitionStore> {
        if self.parsed {
            return Ok(&self.store);
        }

        if let Some(path) = cache_file {
            let inputs_hash = cache::hash_inputs(&self.sources);
            let config_hash = cache::hash_config(&self.config);
            if let Some(store) = cache::load(path, inputs_hash, config_hash) {
                debug!(cache = %path.display(), "loaded definitions from cache");
                self.store = store;
                self.parsed = true;
                return Ok(&self.store);
            }
            self.run()?;
            self.parsed = true;
            cache::save(path, &self.store, inputs_hash, config_hash)?;
            return Ok(&self.store);
        }

        self.run()?;
        self.parsed = true;
        Ok(&self.store)
    }

    /// The store (empty until parsed).
    pub fn store(&self) -> &DefinitionStore {
        &self.store
    }

    /// Non-fatal problems encountered so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn run(&mut self) -> Result<()> {
        let replacements = self.compile_replacements()?;

        let mut preprocessor = Preprocessor::new(&self.config);
        for (name, value) in &self.predefines {
            let body = lexer::tokenize("<predefined>", value)?
                .into_iter()
                .filter(|t| t.kind != TokenKind::Newline)
                .collect();
            preprocessor.table.define(
                name.clone(),
                Macro::Object(ObjectMacro {
                    body,
                    location: None,
                }),
            );
        }

        for i in 0..self.sources.len() {
            let (name, text) = self.sources[i].clone();
            let text = apply_replacements(&text, &replacements);

            debug!(file = %name, "preprocessing");
            let tokens = lexer::tokenize(&name, &text)?;
            let (included, pack_events) = preprocessor.process_file(&name, &tokens);

            debug!(file = %name, tokens = included.len(), "parsing declarations");
            let mut decl_parser = DeclParser::new(
                included,
                &self.config,
                &mut self.store,
                &preprocessor.table,
                &pack_events,
                &name,
            );
            decl_parser.parse();
            self.diagnostics.append(&mut decl_parser.diagnostics);
        }
        let mut preprocess_diags = std::mem::take(&mut preprocessor.diagnostics);
        self.diagnostics.append(&mut preprocess_diags);

        let table = preprocessor.table;
        self.finalize(&table);
        Ok(())
    }

    fn compile_replacements(&self) -> Result<Vec<(Regex, String)>> {
        let mut compiled = Vec::with_capacity(self.config.replacements.len());
        for (pattern, replacement) in &self.config.replacements {
            let regex = Regex::new(pattern).map_err(|e| {
                Error::Config(format!("bad replacement pattern '{}': {}", pattern, e))
            })?;
            compiled.push((regex, replacement.clone()));
        }
        Ok(compiled)
    }

    /// Copy macros into the store and reduce object-like macro values
    /// into `values`; flag typedef chains that do not resolve.
    fn finalize(&mut self, table: &MacroTable) {
        for (name, macro_def) in table.iter() {
            match macro_def {
                Macro::Object(m) => {
                    self.store.macros.insert(name, m.clone());
                    if m.body.is_empty() || self.store.values.contains_key(name) {
                        continue;
                    }
                    let (value, mut eval_diags) = {
                        let store: &DefinitionStore = &self.store;
                        let mut evaluator = Evaluator::new(Some(table), Some(store), "<macro>");
                        let v = evaluator.eval_value(&m.body);
                        (v, evaluator.diagnostics)
                    };
                    self.diagnostics.append(&mut eval_diags);
                    self.store.values.insert(name, value);
                }
                Macro::Function(m) => {
                    self.store.fnmacros.insert(name, m.clone());
                }
            }
        }

        let names: Vec<String> = self.store.types.keys().map(String::from).collect();
        for name in names {
            let ty = match self.store.types.get(&name) {
                Some(t) => t.clone(),
                None => continue,
            };
            if let Err(e) = self.store.resolve(&ty) {
                warn!(typedef = %name, "unresolvable typedef");
                self.diagnostics
                    .push(Diagnostic::warning(None, format!("typedef '{}': {}", name, e)));
            }
        }
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_replacements(text: &str, replacements: &[(Regex, String)]) -> String {
    let mut out = text.to_string();
    for (regex, replacement) in replacements {
        out = regex.replace_all(&out, replacement.as_str()).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdrscan_core::Value;

    #[test]
    fn test_macro_values_reduced_at_finalize() {
        let mut parser = HeaderParser::new();
        parser.add_source("t.h", "#define A 1\n#define B (A + 1)\n#define S \"test\"\n");
        let store = parser.parse().unwrap();
        assert_eq!(store.values.get("A"), Some(&Value::Int(1)));
        assert_eq!(store.values.get("B"), Some(&Value::Int(2)));
        assert_eq!(store.values.get("S"), Some(&Value::Str("test".into())));
    }

    #[test]
    fn test_predefines_seed_the_table() {
        let mut parser = HeaderParser::new();
        parser.define("VERSION", "1500");
        parser.add_source("t.h", "#if VERSION >= 1000\nint modern;\n#endif\n");
        let store = parser.parse().unwrap();
        assert!(store.variables.get("modern").is_some());
    }

    #[test]
    fn test_replacements_run_before_parsing() {
        let mut config = ParserConfig::default();
        config
            .replacements
            .push((r"DL_EXPORT\((\w+)\)".to_string(), "$1".to_string()));
        let mut parser = HeaderParser::with_config(config);
        parser.add_source("t.h", "DL_EXPORT(int) exported_fn(void);\n");
        let store = parser.parse().unwrap();
        assert!(store.functions.get("exported_fn").is_some());
    }

    #[test]
    fn test_macros_accumulate_across_files() {
        let mut parser = HeaderParser::new();
        parser.add_source("first.h", "#define WIDTH 16\n");
        parser.add_source("second.h", "int row[WIDTH];\n");
        let store = parser.parse().unwrap();
        let var = store.variables.get("row").unwrap();
        assert_eq!(var.ty.modifiers.len(), 1);
    }

    #[test]
    fn test_unknown_file_is_not_found() {
        let mut parser = HeaderParser::new();
        assert!(matches!(
            parser.add_file("definitely_missing.h"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let mut parser = HeaderParser::new();
        parser.add_source("t.h", "int x;\n");
        let first = parser.parse().unwrap().clone();
        let second = parser.parse().unwrap().clone();
        assert_eq!(first, second);
    }
}
