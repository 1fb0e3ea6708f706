//! Persistent parse cache
//!
//! One JSON file keyed by two fingerprints: the sorted input names plus
//! contents, and the parser configuration. The cache loads only when both
//! fingerprints and both version fields match; anything else falls back
//! to a full parse. Hashes use the standard library hasher, which is
//! stable enough for the same build on the same machine; the parser
//! version field invalidates caches across builds.

use crate::store::DefinitionStore;
use hdrscan_core::{Error, ParserConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use tracing::debug;

/// Bump whenever the cache layout or store serialisation changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    format_version: u32,
    parser_version: String,
    inputs_hash: u64,
    config_hash: u64,
    store: DefinitionStore,
}

/// Fingerprint the input set: sorted (name, content) pairs.
pub fn hash_inputs(sources: &[(String, String)]) -> u64 {
    let mut sorted: Vec<&(String, String)> = sources.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut hasher = DefaultHasher::new();
    for (name, text) in sorted {
        name.hash(&mut hasher);
        text.hash(&mut hasher);
    }
    hasher.finish()
}

/// Fingerprint the parser configuration.
pub fn hash_config(config: &ParserConfig) -> u64 {
    let json = serde_json::to_string(config).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    json.hash(&mut hasher);
    hasher.finish()
}

/// Load a cached store if the file exists and every fingerprint matches.
pub fn load(path: &Path, inputs_hash: u64, config_hash: u64) -> Option<DefinitionStore> {
    let bytes = fs::read(path).ok()?;
    let cache: CacheFile = match serde_json::from_slice(&bytes) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "cache file unreadable, reparsing");
            return None;
        }
    };
    if cache.format_version != CACHE_FORMAT_VERSION {
        debug!("cache format version changed, reparsing");
        return None;
    }
    if cache.parser_version != env!("CARGO_PKG_VERSION") {
        debug!("cache written by a different parser version, reparsing");
        return None;
    }
    if cache.inputs_hash != inputs_hash {
        debug!("input files changed, reparsing");
        return None;
    }
    if cache.config_hash != config_hash {
        debug!("parser configuration changed, reparsing");
        return None;
    }
    Some(cache.store)
}

/// Write the store with its fingerprints.
pub fn save(
    path: &Path,
    store: &DefinitionStore,
    inputs_hash: u64,
    config_hash: u64,
) -> Result<()> {
    let cache = CacheFile {
        format_version: CACHE_FORMAT_VERSION,
        parser_version: env!("CARGO_PKG_VERSION").to_string(),
        inputs_hash,
        config_hash,
        store: store.clone(),
    };
    let json = serde_json::to_vec(&cache).map_err(|e| Error::Cache(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdrscan_core::Type;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hdrscan-cache-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_roundtrip() {
        let mut store = DefinitionStore::new();
        store.types.insert("myint", Type::primitive("int"));
        let path = temp_path("roundtrip.json");

        save(&path, &store, 11, 22).unwrap();
        let loaded = load(&path, 11, 22).unwrap();
        assert_eq!(loaded, store);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_fingerprint_mismatch_misses() {
        let store = DefinitionStore::new();
        let path = temp_path("mismatch.json");
        save(&path, &store, 11, 22).unwrap();

        assert!(load(&path, 99, 22).is_none());
        assert!(load(&path, 11, 99).is_none());
        assert!(load(&path, 11, 22).is_some());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_or_garbage_file_misses() {
        assert!(load(Path::new("/nonexistent/hdrscan.cache"), 0, 0).is_none());

        let path = temp_path("garbage.json");
        fs::write(&path, b"not json at all").unwrap();
        assert!(load(&path, 0, 0).is_none());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_input_hash_is_order_independent() {
        let a = vec![
            ("a.h".to_string(), "int a;".to_string()),
            ("b.h".to_string(), "int b;".to_string()),
        ];
        let b = vec![a[1].clone(), a[0].clone()];
        assert_eq!(hash_inputs(&a), hash_inputs(&b));

        let c = vec![a[0].clone(), ("b.h".to_string(), "int c;".to_string())];
        assert_ne!(hash_inputs(&a), hash_inputs(&c));
    }

    #[test]
    fn test_config_hash_tracks_changes() {
        let base = ParserConfig::default();
        let mut changed = ParserConfig::default();
        changed.primitive_types.push("BOOL".into());
        assert_ne!(hash_config(&base), hash_config(&changed));
        assert_eq!(hash_config(&base), hash_config(&ParserConfig::default()));
    }
}
