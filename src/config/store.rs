//! The configuration store.
//!
//! Holds three layers and the projection derived from them:
//! - **defaults**: values registered by [`with_defaults`](super::with_defaults)
//! - **values**: file and environment values, merged in option order
//! - **automatic env**: variables captured under an env prefix, consulted for
//!   keys no layer declares
//!
//! The merged tree is recomputed after every option and frozen once
//! construction finishes.

use super::decode::{self, DecodeError};
use super::merge::{
    deep_merge, deep_merge_all, insert_path, leaf_paths, lookup, normalize_keys,
};
use super::options::ConfigOption;
use super::schema::{
    CONFIG_SCHEMA, ConfigStruct, apply_defaults, project, validate_required_fields,
};
use super::source::env_var_name;
use super::value::{to_bool_lenient, to_string_lenient, to_string_map};
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// Mutable state behind the store's lock.
#[derive(Debug, Default)]
pub(crate) struct ConfigState {
    pub(crate) defaults: Value,
    pub(crate) values: Value,
    pub(crate) config_file: Option<PathBuf>,
    env_prefix: Option<String>,
    automatic_env: BTreeMap<String, String>,
    merged: Value,
    config_struct: ConfigStruct,
}

impl ConfigState {
    fn new() -> Self {
        Self {
            defaults: Value::Object(Map::new()),
            values: Value::Object(Map::new()),
            merged: Value::Object(Map::new()),
            ..Default::default()
        }
    }

    pub(crate) fn merge_values(&mut self, overlay: Value) {
        let current = std::mem::take(&mut self.values);
        self.values = deep_merge(current, overlay);
    }

    pub(crate) fn bind_automatic_env(&mut self, prefix: String, captured: BTreeMap<String, String>) {
        self.automatic_env.extend(captured);
        self.env_prefix = Some(prefix);
    }

    /// Captured variable answering for `key`, if any.
    fn env_value(&self, key: &str) -> Option<&String> {
        let prefix = self.env_prefix.as_deref()?;
        self.automatic_env.get(&env_var_name(prefix, key))
    }

    /// Recompute the merged tree, re-derive the projection and validate it.
    pub(crate) fn refresh(&mut self) -> Result<()> {
        let mut base = self.defaults.clone();
        if self.env_prefix.is_some() {
            for key in leaf_paths(&self.defaults) {
                if let Some(value) = self.env_value(&key) {
                    insert_path(&mut base, &key, Value::String(value.clone()));
                }
            }
        }
        self.merged = deep_merge_all([base, self.values.clone()]);

        project(&self.merged, &mut self.config_struct, CONFIG_SCHEMA)?;
        validate_required_fields(&self.config_struct, CONFIG_SCHEMA)
    }

    fn get(&self, key: &str) -> Option<Value> {
        match lookup(&self.merged, key) {
            Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
            None => self.env_value(key).cloned().map(Value::String),
        }
    }
}

/// Configuration assembled from files, environment variables and defaults.
///
/// Built once with [`Config::new`]; afterwards every accessor takes a shared
/// read lock, so a `Config` can be wrapped in an `Arc` and read from any
/// number of threads.
///
/// ```
/// use core_config::config::Config;
///
/// let cfg = Config::new([]).unwrap();
/// assert_eq!(cfg.get_config_struct().environment, "development");
/// ```
#[derive(Debug)]
pub struct Config {
    state: RwLock<ConfigState>,
}

impl Config {
    /// Build a store by applying `options` in order.
    ///
    /// Schema defaults are applied and required fields validated before the
    /// first option runs. The first failing option aborts construction.
    pub fn new(options: impl IntoIterator<Item = ConfigOption>) -> Result<Self> {
        let mut state = ConfigState::new();
        apply_defaults(&mut state.config_struct, CONFIG_SCHEMA)?;
        validate_required_fields(&state.config_struct, CONFIG_SCHEMA)?;

        let mut applied = 0usize;
        for option in options {
            debug!(option = option.name(), "applying configuration option");
            option.apply(&mut state)?;
            applied += 1;
        }

        info!(
            options = applied,
            environment = %state.config_struct.environment,
            "configuration initialized"
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ConfigState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw value at `key`, or `None` when absent or null.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key)
    }

    /// Whether any source supplied a non-null value for `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String form of the value at `key`; `""` when absent.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).as_ref().map(to_string_lenient).unwrap_or_default()
    }

    /// String form of the value at `key`, or `default` when it is not set.
    pub fn get_string_with_default(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(value) => to_string_lenient(&value),
            None => default.to_string(),
        }
    }

    /// Boolean at `key`. Absent or unparseable values read as `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_ref().is_some_and(to_bool_lenient)
    }

    /// String map rooted at `key`; empty when absent or not a mapping.
    pub fn get_string_map_string(&self, key: &str) -> HashMap<String, String> {
        self.get(key)
            .as_ref()
            .and_then(to_string_map)
            .unwrap_or_default()
    }

    /// Copy of the typed projection.
    pub fn get_config_struct(&self) -> ConfigStruct {
        self.read().config_struct.clone()
    }

    /// The fully merged tree.
    pub fn all_settings(&self) -> Value {
        self.read().merged.clone()
    }

    /// Path of the last configuration file loaded, if any.
    pub fn config_file_used(&self) -> Option<PathBuf> {
        self.read().config_file.clone()
    }

    /// Deserialize the whole tree into `T`.
    ///
    /// Scalars convert weakly (`"9090"` fills a `u16`) and struct fields match
    /// keys case-insensitively. Struct fields missing from the tree take
    /// their zero value (`None` for options); use [`Config::unmarshal_into`]
    /// to keep existing values instead.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        let state = self.read();
        Ok(decode::from_value(&state.merged)?)
    }

    /// Deserialize the subtree rooted at `key` into `T`.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key).unwrap_or(Value::Null);
        decode::from_value(&value).map_err(|e| prefix_error(e, key).into())
    }

    /// Decode the tree over an existing value.
    ///
    /// Fields the tree does not mention keep their current values.
    pub fn unmarshal_into<T>(&self, target: &mut T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let current = serde_json::to_value(&*target)
            .map_err(|e| DecodeError::at_path("", e.to_string()))?;
        let current = normalize_keys(current);
        let merged = deep_merge(current, self.all_settings());
        *target = decode::from_value(&merged)?;
        Ok(())
    }
}

fn prefix_error(err: DecodeError, key: &str) -> DecodeError {
    if err.path().is_empty() {
        DecodeError::at_path(key, err.message())
    } else {
        DecodeError::at_path(&format!("{key}.{}", err.path()), err.message())
    }
}
