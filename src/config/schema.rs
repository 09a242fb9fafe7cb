//! The typed projection of the configuration tree.
//!
//! [`ConfigStruct`] mirrors a fixed subset of the tree. Its per-field metadata
//! (tree key, default literal, required flag) lives in [`CONFIG_SCHEMA`] and is
//! processed by [`apply_defaults`], [`project`] and
//! [`validate_required_fields`].

use super::merge::lookup;
use super::value::{kind_name, to_bool_lenient, to_string_lenient, to_string_map};
use crate::config::decode::DecodeError;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Value kinds a schema field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    StringMap,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldKind {
    fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::StringMap => "map",
        }
    }
}

/// Declarative metadata for one projection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Name reported in validation errors.
    pub name: &'static str,
    /// Dotted tree key the field is read from.
    pub key: &'static str,
    pub kind: FieldKind,
    /// Literal applied when the field is still zero after merging.
    pub default: Option<&'static str>,
    pub required: bool,
}

/// Schema of [`ConfigStruct`].
pub const CONFIG_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        name: "Environment",
        key: "environment",
        kind: FieldKind::String,
        default: Some("development"),
        required: true,
    },
    FieldSpec {
        name: "Debug",
        key: "debug",
        kind: FieldKind::Bool,
        default: Some("false"),
        required: false,
    },
    FieldSpec {
        name: "Settings",
        key: "settings",
        kind: FieldKind::StringMap,
        default: Some(""),
        required: false,
    },
];

/// A single field value, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    StringMap(HashMap<String, String>),
}

impl FieldValue {
    /// Whether this is the kind's zero value. An empty map counts as zero.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Bool(b) => !b,
            FieldValue::StringMap(m) => m.is_empty(),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::StringMap(_) => FieldKind::StringMap,
        }
    }
}

/// Well-known application settings projected out of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStruct {
    #[serde(default)]
    pub environment: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl ConfigStruct {
    /// Current value of the field stored under `key`.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "environment" => Some(FieldValue::String(self.environment.clone())),
            "debug" => Some(FieldValue::Bool(self.debug)),
            "settings" => Some(FieldValue::StringMap(self.settings.clone())),
            _ => None,
        }
    }

    /// Replace the field stored under `key`. Callers pair key and kind from
    /// the schema, so a mismatch is a bug.
    pub(crate) fn set_field(&mut self, key: &str, value: FieldValue) {
        debug_assert_eq!(
            self.field(key).map(|current| current.kind()),
            Some(value.kind()),
            "field {key} cannot hold {value:?}"
        );
        match (key, value) {
            ("environment", FieldValue::String(s)) => self.environment = s,
            ("debug", FieldValue::Bool(b)) => self.debug = b,
            ("settings", FieldValue::StringMap(m)) => self.settings = m,
            _ => {}
        }
    }
}

/// Coerce a default literal into a value of `spec`'s kind.
fn default_value(spec: &FieldSpec, literal: &str) -> Result<FieldValue> {
    match spec.kind {
        FieldKind::String => Ok(FieldValue::String(literal.to_string())),
        FieldKind::Bool => Ok(FieldValue::Bool(literal == "true")),
        FieldKind::StringMap if literal.is_empty() => Ok(FieldValue::StringMap(HashMap::new())),
        FieldKind::StringMap => Err(ConfigError::UnsupportedDefault {
            field: spec.name,
            kind: spec.kind.as_str(),
        }),
    }
}

/// Fill zero-valued fields that declare a default literal.
pub fn apply_defaults(target: &mut ConfigStruct, schema: &[FieldSpec]) -> Result<()> {
    for spec in schema {
        let Some(literal) = spec.default else {
            continue;
        };
        match target.field(spec.key) {
            Some(current) if current.is_zero() => {
                target.set_field(spec.key, default_value(spec, literal)?);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Fail on the first required field still holding its zero value.
///
/// A source that sets a required field to `""`, `false` or an empty map is
/// indistinguishable from one that never set it.
pub fn validate_required_fields(target: &ConfigStruct, schema: &[FieldSpec]) -> Result<()> {
    for spec in schema.iter().filter(|spec| spec.required) {
        let missing = target.field(spec.key).is_none_or(|value| value.is_zero());
        if missing {
            return Err(ConfigError::RequiredFieldMissing { field: spec.name });
        }
    }
    Ok(())
}

/// Overwrite fields of `target` with the values the merged `tree` holds.
///
/// Keys absent from the tree leave the current value in place. Booleans are
/// read leniently; a scalar where a map is expected (or the reverse) fails.
pub fn project(tree: &Value, target: &mut ConfigStruct, schema: &[FieldSpec]) -> Result<()> {
    for spec in schema {
        let Some(raw) = lookup(tree, spec.key).filter(|v| !v.is_null()) else {
            continue;
        };
        let value = match spec.kind {
            FieldKind::String if matches!(raw, Value::Object(_) | Value::Array(_)) => {
                return Err(mismatch(spec, raw));
            }
            FieldKind::String => FieldValue::String(to_string_lenient(raw)),
            FieldKind::Bool => FieldValue::Bool(to_bool_lenient(raw)),
            FieldKind::StringMap => {
                FieldValue::StringMap(to_string_map(raw).ok_or_else(|| mismatch(spec, raw))?)
            }
        };
        target.set_field(spec.key, value);
    }
    Ok(())
}

fn mismatch(spec: &FieldSpec, raw: &Value) -> ConfigError {
    DecodeError::at_path(
        spec.key,
        format!("expected {}, found {}", spec.kind, kind_name(raw)),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_defaults_fill_zero_fields() {
        let mut s = ConfigStruct::default();
        apply_defaults(&mut s, CONFIG_SCHEMA).unwrap();
        assert_eq!(s.environment, "development");
        assert!(!s.debug);
        assert!(s.settings.is_empty());
    }

    #[test]
    fn test_set_field_replaces_matching_kind() {
        let mut s = ConfigStruct::default();
        s.set_field("debug", FieldValue::Bool(true));
        s.set_field("environment", FieldValue::String("qa".into()));
        assert!(s.debug);
        assert_eq!(s.field("environment"), Some(FieldValue::String("qa".into())));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "field debug cannot hold")]
    fn test_set_field_rejects_mismatched_kind() {
        let mut s = ConfigStruct::default();
        s.set_field("debug", FieldValue::String("yes".into()));
    }

    #[test]
    fn test_defaults_keep_existing_values() {
        let mut s = ConfigStruct {
            environment: "production".into(),
            ..Default::default()
        };
        apply_defaults(&mut s, CONFIG_SCHEMA).unwrap();
        assert_eq!(s.environment, "production");
    }

    #[test]
    fn test_bool_default_parses_true_literal() {
        let schema = [FieldSpec {
            name: "Debug",
            key: "debug",
            kind: FieldKind::Bool,
            default: Some("true"),
            required: false,
        }];
        let mut s = ConfigStruct::default();
        apply_defaults(&mut s, &schema).unwrap();
        assert!(s.debug);
    }

    #[test]
    fn test_non_empty_map_default_is_unsupported() {
        let schema = [FieldSpec {
            name: "Settings",
            key: "settings",
            kind: FieldKind::StringMap,
            default: Some("a=b"),
            required: false,
        }];
        let err = apply_defaults(&mut ConfigStruct::default(), &schema).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedDefault);
    }

    #[test]
    fn test_required_without_default_fails() {
        let schema = [FieldSpec {
            name: "Environment",
            key: "environment",
            kind: FieldKind::String,
            default: None,
            required: true,
        }];
        let mut s = ConfigStruct::default();
        apply_defaults(&mut s, &schema).unwrap();
        let err = validate_required_fields(&s, &schema).unwrap_err();
        assert_eq!(err.to_string(), "required field Environment is not set");
    }

    #[test]
    fn test_required_rejects_explicit_zero() {
        let tree = json!({"environment": ""});
        let mut s = ConfigStruct {
            environment: "development".into(),
            ..Default::default()
        };
        project(&tree, &mut s, CONFIG_SCHEMA).unwrap();
        assert!(validate_required_fields(&s, CONFIG_SCHEMA).is_err());
    }

    #[test]
    fn test_project_reads_tree() {
        let tree = json!({
            "environment": "production",
            "debug": "true",
            "settings": {"key1": "value1", "port": 80}
        });
        let mut s = ConfigStruct::default();
        project(&tree, &mut s, CONFIG_SCHEMA).unwrap();
        assert_eq!(s.environment, "production");
        assert!(s.debug);
        assert_eq!(s.settings["key1"], "value1");
        assert_eq!(s.settings["port"], "80");
    }

    #[test]
    fn test_project_keeps_absent_fields() {
        let tree = json!({"debug": true});
        let mut s = ConfigStruct {
            environment: "staging".into(),
            ..Default::default()
        };
        project(&tree, &mut s, CONFIG_SCHEMA).unwrap();
        assert_eq!(s.environment, "staging");
        assert!(s.debug);
    }

    #[test]
    fn test_project_malformed_bool_is_false() {
        let tree = json!({"debug": "not-a-boolean"});
        let mut s = ConfigStruct {
            debug: true,
            ..Default::default()
        };
        project(&tree, &mut s, CONFIG_SCHEMA).unwrap();
        assert!(!s.debug);
    }

    #[test]
    fn test_project_rejects_scalar_settings() {
        let tree = json!({"settings": "flat"});
        let err = project(&tree, &mut ConfigStruct::default(), CONFIG_SCHEMA).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnmarshalFailure);
        assert!(err.to_string().contains("settings"));
    }
}
