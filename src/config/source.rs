//! Reading configuration sources: files and the process environment.

use super::merge::normalize_keys;
use super::value::kind_name;
use crate::error::{ConfigError, ReadFailure, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env::VarError;
use std::path::Path;
use tracing::debug;

/// Keys bound explicitly by the environment option.
pub const ENV_BOUND_KEYS: &[&str] = &["environment", "debug", "app.name", "app.port"];

/// File formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// Detect the format from `path`'s extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Ok(SourceFormat::Yaml),
            Some("json") => Ok(SourceFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse a document into a key-folded mapping.
    ///
    /// Empty and `null` documents yield an empty mapping.
    pub fn parse(self, content: &str) -> std::result::Result<Value, ReadFailure> {
        if content.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let value: Value = match self {
            SourceFormat::Yaml => serde_yaml::from_str(content)?,
            SourceFormat::Json => serde_json::from_str(content)?,
        };
        match value {
            Value::Null => Ok(Value::Object(Map::new())),
            Value::Object(_) => Ok(normalize_keys(value)),
            other => Err(ReadFailure::NotAMapping(kind_name(&other))),
        }
    }
}

/// Read and parse the configuration file at `path`.
pub fn read_file(path: &Path) -> Result<Value> {
    let format = SourceFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "reading config file");
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::file_read(path, e))?;
    format
        .parse(&content)
        .map_err(|e| ConfigError::file_read(path, e))
}

/// Environment variable name for `key` under `prefix`.
///
/// `env_var_name("config", "app.name")` is `CONFIG_APP_NAME`. An empty prefix
/// yields just the key part.
pub fn env_var_name(prefix: &str, key: &str) -> String {
    let key = key.replace('.', "_").to_uppercase();
    if prefix.is_empty() {
        key
    } else {
        format!("{}_{}", prefix.to_uppercase(), key)
    }
}

/// Read a variable, treating unset and empty as absent.
pub fn read_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e @ VarError::NotUnicode(_)) => Err(ConfigError::EnvBinding {
            var: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Snapshot of every set, non-empty, Unicode variable under `prefix`.
pub fn capture_prefixed(prefix: &str) -> BTreeMap<String, String> {
    let head = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}_", prefix.to_uppercase())
    };
    std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
        .filter(|(name, value)| name.starts_with(&head) && !value.is_empty())
        .collect()
}
