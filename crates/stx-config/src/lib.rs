//! stx-config
//!
//! Layered configuration documents (YAML or JSON), merged in order with later
//! layers overriding earlier ones, hashed canonically, and viewed through the
//! typed [`StonxConfig`].
//!
//! Loading never fails on bad content: a missing file is an empty layer and a
//! malformed document is an empty layer plus a `warn!`. Only real IO failures
//! (permissions, unreadable paths) are errors.

pub mod settings;

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub use settings::{
    default_cache_path, default_cache_path_from, CacheConfig, CalendarKind, ChartConfig,
    SessionConfig, StonxConfig,
};

/// Path list (platform path separator) of config layers, lowest priority first.
pub const ENV_CONFIG_PATH: &str = "STX_CONFIG";

// ---------------------------------------------------------------------------
// Loading + layering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn empty() -> Self {
        Self::from_value(serde_json::json!({}))
    }

    fn from_value(config_json: Value) -> Self {
        // serde_json::Map is key-sorted, so the compact rendering is canonical.
        let canonical_json = config_json.to_string();
        let config_hash = sha256_hex(canonical_json.as_bytes());
        Self {
            config_hash,
            canonical_json,
            config_json,
        }
    }

    /// Look up a value by JSON pointer (`/session/timezone`) or, for flat
    /// legacy documents, by top-level key (`timezone_tws`).
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        if key.starts_with('/') {
            self.config_json.pointer(key)
        } else {
            self.config_json.get(key)
        }
    }

    /// Typed view. A document that does not fit the schema degrades to
    /// defaults with a warning.
    pub fn settings(&self) -> StonxConfig {
        StonxConfig::from_json(&self.config_json)
    }
}

/// Load and merge the given layers in order.
pub fn load_layered(paths: &[PathBuf]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        match fs::read_to_string(p) {
            Ok(raw) => docs.push(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %p.display(), "config layer not found; skipping");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config path: {}", p.display()))
            }
        }
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    Ok(load_layered_from_strings(&doc_refs))
}

/// Merge documents in order: earlier docs are base, later docs override.
pub fn load_layered_from_strings(docs: &[&str]) -> LoadedConfig {
    let mut merged = serde_json::json!({});
    for (i, raw) in docs.iter().enumerate() {
        match parse_layer(raw) {
            Ok(Some(layer)) => merged = deep_merge(merged, layer),
            Ok(None) => {}
            Err(e) => warn!(layer = i, error = %e, "invalid config document ignored"),
        }
    }
    LoadedConfig::from_value(merged)
}

/// Layer paths from `STX_CONFIG`, else `<app dir>/config.json`.
pub fn default_config_paths() -> Vec<PathBuf> {
    if let Some(list) = std::env::var_os(ENV_CONFIG_PATH) {
        return std::env::split_paths(&list).collect();
    }
    settings::app_data_dir_from(|k| std::env::var(k).ok())
        .map(|dir| vec![dir.join("config.json")])
        .unwrap_or_default()
}

/// YAML is a superset of JSON, so one parser covers both formats.
/// Empty documents are `Ok(None)`; non-mapping documents are errors.
fn parse_layer(raw: &str) -> Result<Option<Value>> {
    let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml/json")?;
    let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
    match v_json {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(v_json)),
        other => bail!("config document must be a mapping, got {}", kind_of(&other)),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Unused-key report
// ---------------------------------------------------------------------------

/// JSON-pointer prefixes read by this workspace. A leaf under any of them is
/// consumed; any other leaf is reported as unused.
///
/// Keep in sync with `settings.rs`.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/display_timezone",
    "/timezone_tws",
    "/session/timezone",
    "/session/pre_market_open",
    "/session/market_open",
    "/session/market_close",
    "/session/post_market_close",
    "/session/calendar",
    "/session/extra_holidays",
    "/session/bounds",
    "/cache/path",
    "/cache/batch_size",
    "/chart/pre_post_market_highlight",
    "/chart/default_bar_size",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Minimal set of unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Produce an unused-key report.
/// `Fail` returns an error when unused keys exist; `Warn` logs and returns the
/// report.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS.iter().map(|p| normalize_pointer(p)).collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if !report.is_clean() {
        if policy == UnusedKeyPolicy::Fail {
            bail!(
                "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. First few: {:?}",
                report.unused_leaf_pointers.len(),
                report.unused_leaf_pointers.iter().take(12).collect::<Vec<_>>()
            );
        }
        warn!(keys = ?report.unused_leaf_pointers, "unused config keys");
    }

    Ok(report)
}

/// Must begin with "/"; no trailing "/" unless it is just "/".
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc"; "/" consumes everything.
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{prefix}/{i}");
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ if prefix.is_empty() => {}
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

/// Convenience: load the default layers (see [`default_config_paths`]).
pub fn load_default() -> Result<LoadedConfig> {
    load_layered(&default_config_paths())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_override_nested_keys() {
        let base = r#"{"session": {"timezone": "US/Eastern", "market_open": "09:30"}}"#;
        let over = "session:\n  market_open: \"10:00\"\n";
        let loaded = load_layered_from_strings(&[base, over]);
        assert_eq!(
            loaded.get_property("/session/market_open"),
            Some(&Value::String("10:00".to_string()))
        );
        assert_eq!(
            loaded.get_property("/session/timezone"),
            Some(&Value::String("US/Eastern".to_string()))
        );
    }

    #[test]
    fn malformed_layer_is_ignored() {
        let good = r#"{"display_timezone": "UTC"}"#;
        let bad = "{ this is: [ not valid";
        let loaded = load_layered_from_strings(&[good, bad]);
        assert_eq!(
            loaded.get_property("display_timezone"),
            Some(&Value::String("UTC".to_string()))
        );
    }

    #[test]
    fn non_mapping_and_empty_layers_are_ignored() {
        let loaded = load_layered_from_strings(&["", "- a\n- b\n", "42"]);
        assert_eq!(loaded.config_json, serde_json::json!({}));
        assert_eq!(loaded.config_hash, LoadedConfig::empty().config_hash);
    }

    #[test]
    fn prefix_matching_respects_token_boundaries() {
        assert!(is_prefix_pointer("/cache", "/cache/path"));
        assert!(is_prefix_pointer("/cache/path", "/cache/path"));
        assert!(!is_prefix_pointer("/cache", "/cache_extra/x"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn pointers_are_normalized() {
        assert_eq!(normalize_pointer("cache/"), "/cache");
        assert_eq!(normalize_pointer(""), "/");
    }
}
