//! Source-loading options applied in order by [`Config::new`](super::Config::new).

use super::merge::{insert_path, leaf_paths};
use super::source::{ENV_BOUND_KEYS, capture_prefixed, env_var_name, read_env, read_file};
use super::store::ConfigState;
use crate::error::Result;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

type ApplyFn = Box<dyn FnOnce(&mut ConfigState) -> Result<()> + Send>;

/// A deferred configuration step.
///
/// Each option may add values to the store's layers. After it runs, the
/// projection is re-derived and required fields are re-validated; any error
/// aborts construction.
pub struct ConfigOption {
    name: &'static str,
    apply: ApplyFn,
}

impl ConfigOption {
    fn new(
        name: &'static str,
        apply: impl FnOnce(&mut ConfigState) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name,
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn apply(self, state: &mut ConfigState) -> Result<()> {
        (self.apply)(state)?;
        state.refresh()
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOption")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Load a YAML (`.yaml`, `.yml`) or JSON (`.json`) file.
///
/// File values merge over whatever earlier file or environment options
/// supplied. The extension is checked before the file is touched.
pub fn with_filepath(path: impl Into<PathBuf>) -> ConfigOption {
    let path = path.into();
    ConfigOption::new("filepath", move |state| {
        let values = read_file(&path)?;
        state.merge_values(values);
        state.config_file = Some(path);
        Ok(())
    })
}

/// Register fallback values.
///
/// Keys may be dotted paths (`"settings.theme"`) or values may be nested
/// objects; both land in the same place. Defaults only answer for keys no
/// file or environment source set.
///
/// ```
/// use core_config::config::{Config, with_defaults};
/// use serde_json::json;
///
/// let cfg = Config::new([with_defaults([
///     ("environment", json!("staging")),
///     ("settings.theme", json!("dark")),
///     ("app", json!({"port": 8080})),
/// ])])
/// .unwrap();
/// assert_eq!(cfg.get_string_with_default("app.port", "0"), "8080");
/// ```
pub fn with_defaults<I, K, V>(defaults: I) -> ConfigOption
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let entries: Vec<(String, Value)> = defaults
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    ConfigOption::new("defaults", move |state| {
        for (key, value) in entries {
            insert_path(&mut state.defaults, &key, value);
        }
        Ok(())
    })
}

/// Read environment variables named `<PREFIX>_<KEY>`.
///
/// `environment`, `debug`, `app.name` and `app.port` are bound explicitly.
/// Every other variable under the prefix is captured too: it overrides a
/// key already present in the tree and answers lookups for keys no source
/// declares. Unset and empty variables are ignored.
pub fn with_env(prefix: impl Into<String>) -> ConfigOption {
    let prefix = prefix.into();
    ConfigOption::new("env", move |state| {
        for key in ENV_BOUND_KEYS {
            let var = env_var_name(&prefix, key);
            if let Some(value) = read_env(&var)? {
                debug!(%var, key, "bound environment variable");
                insert_path(&mut state.values, key, Value::String(value));
            }
        }

        let captured = capture_prefixed(&prefix);
        let mut known = leaf_paths(&state.values);
        known.extend(leaf_paths(&state.defaults));
        for key in known {
            if ENV_BOUND_KEYS.contains(&key.as_str()) {
                continue;
            }
            let var = env_var_name(&prefix, &key);
            if let Some(value) = captured.get(&var) {
                debug!(%var, key = %key, "environment overrides existing key");
                insert_path(&mut state.values, &key, Value::String(value.clone()));
            }
        }

        state.bind_automatic_env(prefix, captured);
        Ok(())
    })
}
