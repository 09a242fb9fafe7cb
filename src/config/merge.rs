//! Deep merge and path helpers for the configuration tree.
//!
//! Implements field-by-field merging where later layers override earlier ones.
//! Arrays are replaced entirely, not concatenated. Keys are folded to lower
//! case so every lookup is case-insensitive.

use serde_json::{Map, Value};
use tracing::warn;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans, nulls are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use core_config::config::deep_merge;
///
/// let base = json!({
///     "app": { "port": 8080, "name": "svc" },
///     "features": ["a", "b"]
/// });
/// let overlay = json!({
///     "app": { "port": 9000 },
///     "features": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result, json!({ "app": { "port": 9000, "name": "svc" }, "features": ["c"] }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

/// Fold every object key in `value` to lower case.
///
/// Keys that collide after folding are deep-merged in document order.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut folded = Map::with_capacity(map.len());
            for (key, child) in map {
                let lower = key.to_lowercase();
                let child = normalize_keys(child);
                let merged = match folded.remove(&lower) {
                    Some(existing) => {
                        warn!(key = %key, "duplicate key differing only by case; later value wins");
                        deep_merge(existing, child)
                    }
                    None => child,
                };
                folded.insert(lower, merged);
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Build a nested object placing `value` at the dotted `path`.
///
/// `expand_path("app.name", v)` yields `{"app": {"name": v}}`. Segments are
/// lower-cased; empty segments are skipped.
pub fn expand_path(path: &str, value: Value) -> Value {
    let value = normalize_keys(value);
    path.rsplit('.')
        .filter(|segment| !segment.is_empty())
        .fold(value, |inner, segment| {
            let mut map = Map::new();
            map.insert(segment.to_lowercase(), inner);
            Value::Object(map)
        })
}

/// Insert `value` at the dotted `path` of `tree`, merging with what is there.
pub fn insert_path(tree: &mut Value, path: &str, value: Value) {
    let current = std::mem::take(tree);
    *tree = deep_merge(current, expand_path(path, value));
}

/// Look up the value at the dotted `path`. Matching is case-insensitive.
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut node = tree;
    for segment in path.split('.') {
        node = node.as_object()?.get(&segment.to_lowercase())?;
    }
    Some(node)
}

/// Dotted paths of every non-object leaf in `tree`.
pub fn leaf_paths(tree: &Value) -> Vec<String> {
    fn walk(node: &Value, prefix: &str, out: &mut Vec<String>) {
        match node {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(child, &path, out);
                }
            }
            _ if !prefix.is_empty() => out.push(prefix.to_string()),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(tree, "", &mut out);
    out
}
