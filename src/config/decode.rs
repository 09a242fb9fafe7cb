//! Weakly typed deserialization of the configuration tree.
//!
//! Values coming from environment variables are always strings, and YAML
//! authors rarely quote consistently, so decoding into caller types converts
//! between scalars where the intent is unambiguous:
//!
//! - strings parse into booleans and numbers (`"9090"` into `u16`)
//! - booleans and numbers format into strings
//! - non-zero numbers are `true`, zero is `false`
//! - `"a,b,c"` becomes a three-element sequence
//! - null becomes the zero value (`""`, `false`, `0`, empty map)
//!
//! Struct fields match tree keys case-insensitively. Errors carry the dotted
//! path of the value that failed.

use super::value::{kind_name, parse_bool};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess,
    Unexpected, Visitor,
};
use serde_json::{Map, Value};
use std::fmt;

/// A failed conversion, with the tree path it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    path: Vec<String>,
    message: String,
}

impl DecodeError {
    pub(crate) fn at_path(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            message: message.into(),
        }
    }

    fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// Dotted path of the offending value; empty for the root.
    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "'{}': {}", self.path(), self.message)
        }
    }
}

impl std::error::Error for DecodeError {}

impl de::Error for DecodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self {
            path: Vec::new(),
            message: msg.to_string(),
        }
    }
}

/// Deserialize `T` from a tree value using weak typing.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    T::deserialize(WeakDeserializer::new(value))
}

/// A [`serde::Deserializer`] over a borrowed tree value.
pub struct WeakDeserializer<'a> {
    value: &'a Value,
}

impl<'a> WeakDeserializer<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    fn unexpected(&self) -> Unexpected<'a> {
        match self.value {
            Value::Null => Unexpected::Unit,
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Unexpected::Signed(i),
                (_, Some(u)) => Unexpected::Unsigned(u),
                _ => Unexpected::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Unexpected::Str(s),
            Value::Array(_) => Unexpected::Seq,
            Value::Object(_) => Unexpected::Map,
        }
    }

    fn invalid_type<'de, V: Visitor<'de>>(&self, visitor: &V) -> DecodeError {
        de::Error::invalid_type(self.unexpected(), visitor)
    }

    fn integer(&self) -> Result<i128, DecodeError> {
        match self.value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i128::from(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(i128::from(u))
                } else {
                    // Floats truncate toward zero.
                    Ok(n.as_f64().unwrap_or_default() as i128)
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0);
                }
                s.parse::<i128>().map_err(|_| {
                    de::Error::custom(format!("cannot parse '{s}' as an integer"))
                })
            }
            Value::Array(_) | Value::Object(_) => Err(de::Error::custom(format!(
                "expected an integer, found {}",
                kind_name(self.value)
            ))),
        }
    }

    fn float(&self) -> Result<f64, DecodeError> {
        match self.value {
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(n.as_f64().unwrap_or_default()),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0.0);
                }
                s.parse::<f64>()
                    .map_err(|_| de::Error::custom(format!("cannot parse '{s}' as a float")))
            }
            Value::Array(_) | Value::Object(_) => Err(de::Error::custom(format!(
                "expected a float, found {}",
                kind_name(self.value)
            ))),
        }
    }
}

macro_rules! deserialize_integer {
    ($method:ident, $ty:ty, $visit:ident) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            let n = self.integer()?;
            let n = <$ty>::try_from(n).map_err(|_| {
                de::Error::custom(format!("{} is out of range for {}", n, stringify!($ty)))
            })?;
            visitor.$visit(n)
        }
    };
}

impl<'de, 'a> Deserializer<'de> for WeakDeserializer<'a> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    visitor.visit_u64(u)
                } else if let Some(i) = n.as_i64() {
                    visitor.visit_i64(i)
                } else {
                    visitor.visit_f64(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => visitor.visit_str(s),
            Value::Array(items) => visitor.visit_seq(SeqAccessor::new(items.clone())),
            Value::Object(map) => visitor.visit_map(MapAccessor::new(Some(map), None)),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_bool(false),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Number(n) => visitor.visit_bool(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) if s.is_empty() => visitor.visit_bool(false),
            Value::String(s) => match parse_bool(s) {
                Some(b) => visitor.visit_bool(b),
                None => Err(de::Error::invalid_value(Unexpected::Str(s), &visitor)),
            },
            Value::Array(_) | Value::Object(_) => Err(self.invalid_type(&visitor)),
        }
    }

    deserialize_integer!(deserialize_i8, i8, visit_i8);
    deserialize_integer!(deserialize_i16, i16, visit_i16);
    deserialize_integer!(deserialize_i32, i32, visit_i32);
    deserialize_integer!(deserialize_i64, i64, visit_i64);
    deserialize_integer!(deserialize_u8, u8, visit_u8);
    deserialize_integer!(deserialize_u16, u16, visit_u16);
    deserialize_integer!(deserialize_u32, u32, visit_u32);
    deserialize_integer!(deserialize_u64, u64, visit_u64);

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_f32(self.float()? as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_str(""),
            Value::Bool(b) => visitor.visit_string(b.to_string()),
            Value::Number(n) => visitor.visit_string(n.to_string()),
            Value::String(s) => visitor.visit_str(s),
            Value::Array(_) | Value::Object(_) => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::String(s) => visitor.visit_bytes(s.as_bytes()),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_seq(SeqAccessor::new(Vec::new())),
            Value::Array(items) => visitor.visit_seq(SeqAccessor::new(items.clone())),
            Value::String(s) if s.is_empty() => visitor.visit_seq(SeqAccessor::new(Vec::new())),
            Value::String(s) => {
                let parts = s
                    .split(',')
                    .map(|part| Value::String(part.trim().to_string()))
                    .collect();
                visitor.visit_seq(SeqAccessor::new(parts))
            }
            Value::Bool(_) | Value::Number(_) | Value::Object(_) => {
                Err(self.invalid_type(&visitor))
            }
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_map(MapAccessor::new(None, None)),
            Value::Object(map) => visitor.visit_map(MapAccessor::new(Some(map), None)),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_map(MapAccessor::new(None, Some(fields))),
            Value::Object(map) => visitor.visit_map(MapAccessor::new(Some(map), Some(fields))),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::String(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            other => other
                .clone()
                .deserialize_enum(name, variants, visitor)
                .map_err(de::Error::custom),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }
}

struct SeqAccessor {
    items: std::iter::Enumerate<std::vec::IntoIter<Value>>,
}

impl SeqAccessor {
    fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_iter().enumerate(),
        }
    }
}

impl<'de> SeqAccess<'de> for SeqAccessor {
    type Error = DecodeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, DecodeError> {
        match self.items.next() {
            Some((index, item)) => seed
                .deserialize(WeakDeserializer::new(&item))
                .map(Some)
                .map_err(|e| e.within(index.to_string())),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

static NULL: Value = Value::Null;

/// Walks a mapping. For structs, declared fields the mapping lacks are
/// yielded afterwards paired with null, so they decode to their zero value.
struct MapAccessor<'a> {
    entries: Option<serde_json::map::Iter<'a>>,
    fields: Option<&'static [&'static str]>,
    seen: Vec<&'static str>,
    missing: usize,
    pending: Option<(&'a str, &'a Value)>,
}

impl<'a> MapAccessor<'a> {
    fn new(map: Option<&'a Map<String, Value>>, fields: Option<&'static [&'static str]>) -> Self {
        Self {
            entries: map.map(|m| m.iter()),
            fields,
            seen: Vec::new(),
            missing: 0,
            pending: None,
        }
    }

    /// Struct field matching `key` regardless of case.
    fn field_for(&self, key: &str) -> Option<&'static str> {
        self.fields?
            .iter()
            .copied()
            .find(|f| f.eq_ignore_ascii_case(key))
    }

    /// Next declared field no entry supplied.
    fn next_missing(&mut self) -> Option<&'static str> {
        let fields = self.fields?;
        while let Some(field) = fields.get(self.missing).copied() {
            self.missing += 1;
            if !self.seen.contains(&field) {
                return Some(field);
            }
        }
        None
    }
}

impl<'de, 'a> MapAccess<'de> for MapAccessor<'a> {
    type Error = DecodeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, DecodeError> {
        let (key, value, canonical) = match self.entries.as_mut().and_then(Iterator::next) {
            Some((key, value)) => {
                let canonical = match self.field_for(key) {
                    Some(field) => {
                        self.seen.push(field);
                        field.to_string()
                    }
                    None => key.clone(),
                };
                (key.as_str(), value, canonical)
            }
            None => match self.next_missing() {
                Some(field) => (field, &NULL, field.to_string()),
                None => return Ok(None),
            },
        };
        self.pending = Some((key, value));
        seed.deserialize(WeakDeserializer::new(&Value::String(canonical)))
            .map(Some)
            .map_err(|e| e.within(key.to_string()))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, DecodeError> {
        let Some((key, value)) = self.pending.take() else {
            return Err(de::Error::custom("value requested before key"));
        };
        seed.deserialize(WeakDeserializer::new(value))
            .map_err(|e| e.within(key.to_string()))
    }

    fn size_hint(&self) -> Option<usize> {
        self.entries.as_ref().map(ExactSizeIterator::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize, PartialEq)]
    struct App {
        name: String,
        port: u16,
        #[serde(default)]
        enabled: bool,
    }

    #[test]
    fn test_strings_parse_into_scalars() {
        let tree = json!({"name": "svc", "port": "9090", "enabled": "true"});
        let app: App = from_value(&tree).unwrap();
        assert_eq!(
            app,
            App {
                name: "svc".into(),
                port: 9090,
                enabled: true
            }
        );
    }

    #[test]
    fn test_scalars_format_into_strings() {
        #[derive(Deserialize)]
        struct Target {
            port: String,
            flag: String,
        }
        let t: Target = from_value(&json!({"port": 8080, "flag": false})).unwrap();
        assert_eq!(t.port, "8080");
        assert_eq!(t.flag, "false");
    }

    #[test]
    fn test_fields_match_case_insensitively() {
        #[derive(Deserialize)]
        struct Target {
            #[serde(rename = "ServiceName")]
            service_name: String,
        }
        let t: Target = from_value(&json!({"servicename": "api"})).unwrap();
        assert_eq!(t.service_name, "api");
    }

    #[test]
    fn test_comma_string_into_sequence() {
        let hosts: Vec<String> = from_value(&json!("a, b,c")).unwrap();
        assert_eq!(hosts, vec!["a", "b", "c"]);
        let ports: Vec<u16> = from_value(&json!("80,443")).unwrap();
        assert_eq!(ports, vec![80, 443]);
    }

    #[test]
    fn test_null_reads_as_zero() {
        #[derive(Deserialize)]
        struct Target {
            name: String,
            count: u32,
            on: bool,
            maybe: Option<String>,
        }
        let t: Target =
            from_value(&json!({"name": null, "count": null, "on": null, "maybe": null})).unwrap();
        assert_eq!(t.name, "");
        assert_eq!(t.count, 0);
        assert!(!t.on);
        assert!(t.maybe.is_none());
    }

    #[test]
    fn test_absent_fields_read_as_zero() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Inner {
            port: u16,
        }
        #[derive(Debug, Deserialize, PartialEq)]
        struct Target {
            #[serde(rename = "Name")]
            name: String,
            retries: u32,
            tags: Vec<String>,
            limits: HashMap<String, String>,
            maybe: Option<String>,
            inner: Inner,
        }
        let t: Target = from_value(&json!({"name": "svc"})).unwrap();
        assert_eq!(
            t,
            Target {
                name: "svc".into(),
                retries: 0,
                tags: Vec::new(),
                limits: HashMap::new(),
                maybe: None,
                inner: Inner { port: 0 },
            }
        );
        let empty: Inner = from_value(&Value::Null).unwrap();
        assert_eq!(empty, Inner { port: 0 });
    }

    #[test]
    fn test_error_carries_path() {
        #[derive(Debug, Deserialize)]
        struct Outer {
            #[allow(dead_code)]
            app: App,
        }
        let err = from_value::<Outer>(&json!({"app": {"name": "x", "port": "http"}})).unwrap_err();
        assert_eq!(err.path(), "app.port");
        assert!(err.to_string().contains("cannot parse 'http'"));
    }

    #[test]
    fn test_out_of_range_integer() {
        let err = from_value::<u8>(&json!(300)).unwrap_err();
        assert!(err.message().contains("out of range for u8"));
    }

    #[test]
    fn test_invalid_bool_string_is_an_error() {
        let err = from_value::<bool>(&json!("not-a-boolean")).unwrap_err();
        assert!(err.message().contains("not-a-boolean"));
    }

    #[test]
    fn test_mapping_into_scalar_fails() {
        assert!(from_value::<i32>(&json!({"a": 1})).is_err());
        assert!(from_value::<Vec<String>>(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_enums_from_strings() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Mode {
            Fast,
            Safe,
        }
        let modes: HashMap<String, Mode> = from_value(&json!({"a": "fast", "b": "safe"})).unwrap();
        assert_eq!(modes["a"], Mode::Fast);
        assert_eq!(modes["b"], Mode::Safe);
    }

    #[test]
    fn test_numeric_map_keys() {
        let map: HashMap<u16, String> = from_value(&json!({"80": "http"})).unwrap();
        assert_eq!(map[&80], "http");
    }
}
