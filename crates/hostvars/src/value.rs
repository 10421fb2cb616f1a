//! value representation
//!
//! Variables attached to groups, hosts and the snapshot all share one model:
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Values are read from YAML (JSON documents are valid YAML). Scalar mapping keys such as `80` or `true`
//! are turned into strings, integers that do not fit into an i64 become decimals.
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// Variable name to value, in declaration order
pub type Variables = IndexMap<String, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(Variables),
}

impl Value {
    /// Merge `other` into `self`
    ///
    /// Two objects are merged key by key (recursively), keys of `other` win on conflict.
    /// Every other combination replaces `self` with `other`; arrays are never concatenated.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Object(existing), Value::Object(incoming)) => merge(existing, incoming),
            (this, other) => *this = other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Deep merge `incoming` into `base`, see [Value::merge]
pub fn merge(base: &mut Variables, incoming: Variables) {
    for (key, value) in incoming {
        match base.get_mut(&key) {
            Some(existing) => existing.merge(value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<Variables> for Value {
    fn from(value: Variables) -> Self {
        Value::Object(value)
    }
}

impl From<serde_yaml::Number> for Value {
    fn from(value: serde_yaml::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // u64 beyond i64::MAX, or a float. Both fit into an f64, possibly with precision loss.
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValueError {
    #[error("mapping keys must be scalars, found {0}")]
    UnsupportedKey(&'static str),
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = ValueError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value as Yaml;

        Ok(match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => b.into(),
            Yaml::Number(n) => n.into(),
            Yaml::String(s) => s.into(),
            Yaml::Sequence(seq) => Value::Array(
                seq.into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Yaml::Mapping(map) => Value::Object(variables_from_mapping(map)?),
            Yaml::Tagged(tagged) => Value::try_from(tagged.value)?,
        })
    }
}

/// Convert a yaml mapping into [Variables]
pub fn variables_from_mapping(map: serde_yaml::Mapping) -> Result<Variables, ValueError> {
    map.into_iter()
        .map(|(key, value)| Ok((mapping_key(key)?, Value::try_from(value)?)))
        .collect()
}

fn mapping_key(key: serde_yaml::Value) -> Result<String, ValueError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => mapping_key(tagged.value),
        Yaml::Sequence(_) => Err(ValueError::UnsupportedKey("sequence")),
        Yaml::Mapping(_) => Err(ValueError::UnsupportedKey("mapping")),
    }
}

/// Name of a yaml node type, used in error messages
pub(crate) fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "boolean",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

impl<'de> serde::de::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        let yaml = serde_yaml::Value::deserialize(deserializer)?;
        Value::try_from(yaml).map_err(serde::de::Error::custom)
    }
}

/// Parse yaml into [Variables], panics on invalid input
///
/// Test helper.
#[cfg(test)]
pub(crate) fn vars(yaml: &str) -> Variables {
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(yaml).expect("yaml mapping");
    variables_from_mapping(mapping).expect("valid variables")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_objects_merge() {
        let mut base = vars("opts: {a: 1, nested: {x: 1}}");
        merge(&mut base, vars("opts: {b: 2, nested: {y: 2}}"));

        assert_eq!(base, vars("opts: {a: 1, nested: {x: 1, y: 2}, b: 2}"));
    }

    #[test]
    fn arrays_are_replaced() {
        let mut base = vars("tags: [x]");
        merge(&mut base, vars("tags: [y]"));

        assert_eq!(base["tags"], Value::from(vec!["y"]));
    }

    #[test]
    fn scalar_replaces_object_and_back() {
        let mut base = vars("opts: {a: 1}");
        merge(&mut base, vars("opts: plain"));
        assert_eq!(base["opts"], Value::from("plain"));

        merge(&mut base, vars("opts: {b: 2}"));
        assert_eq!(base, vars("opts: {b: 2}"));
    }

    #[test]
    fn null_replaces() {
        let mut base = vars("user: admin");
        merge(&mut base, vars("user:"));
        assert_eq!(base["user"], Value::Null);
    }

    #[test]
    fn scalar_keys_become_strings() {
        let parsed = vars("80: http\ntrue: yes\n");
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["80", "true"]);
    }

    #[test]
    fn sequence_keys_are_rejected() {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str("? [a, b]\n: 1\n").unwrap();
        assert_eq!(
            variables_from_mapping(mapping),
            Err(ValueError::UnsupportedKey("sequence"))
        );
    }

    #[test]
    fn large_integers_become_decimals() {
        let parsed = vars("big: 18446744073709551615");
        assert!(matches!(parsed["big"], Value::Decimal(_)));
    }
}
