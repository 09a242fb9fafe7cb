//! Lenient coercions from raw tree values to the types accessors return.
//!
//! Accessors never fail: a value that cannot be read as the requested type
//! yields the type's zero value instead.

use serde_json::Value;
use std::collections::HashMap;

/// Parse a boolean literal the way configuration files usually spell them.
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false
/// counterparts. Anything else is `None`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// String form of a scalar. Maps, sequences and null read as `""`.
pub fn to_string_lenient(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Boolean interpretation of a value; unparseable input is `false`.
pub fn to_bool_lenient(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => parse_bool(s).unwrap_or(false),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Map of strings rooted at `value`, if it is a mapping.
///
/// A string holding a JSON object (as environment variables often do) is
/// parsed first.
pub fn to_string_map(value: &Value) -> Option<HashMap<String, String>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), to_string_lenient(v)))
                .collect(),
        ),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => to_string_map(&parsed),
            _ => None,
        },
        _ => None,
    }
}

/// Short name of a value's variant, for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bool_literals() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("not-a-boolean"), None);
    }

    #[test]
    fn test_to_string_lenient() {
        assert_eq!(to_string_lenient(&json!("x")), "x");
        assert_eq!(to_string_lenient(&json!(true)), "true");
        assert_eq!(to_string_lenient(&json!(8080)), "8080");
        assert_eq!(to_string_lenient(&json!(1.5)), "1.5");
        assert_eq!(to_string_lenient(&json!({"a": 1})), "");
        assert_eq!(to_string_lenient(&Value::Null), "");
    }

    #[test]
    fn test_to_bool_lenient() {
        assert!(to_bool_lenient(&json!(true)));
        assert!(to_bool_lenient(&json!("true")));
        assert!(to_bool_lenient(&json!(2)));
        assert!(!to_bool_lenient(&json!(0)));
        assert!(!to_bool_lenient(&json!("not-a-boolean")));
        assert!(!to_bool_lenient(&json!({"a": true})));
    }

    #[test]
    fn test_to_string_map() {
        let map = to_string_map(&json!({"key1": "value1", "n": 3, "b": false})).unwrap();
        assert_eq!(map["key1"], "value1");
        assert_eq!(map["n"], "3");
        assert_eq!(map["b"], "false");

        let from_json = to_string_map(&json!(r#"{"a": "b"}"#)).unwrap();
        assert_eq!(from_json["a"], "b");

        assert!(to_string_map(&json!("plain")).is_none());
        assert!(to_string_map(&json!([1, 2])).is_none());
    }
}
