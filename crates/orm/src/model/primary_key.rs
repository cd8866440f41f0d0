//! Primary Key System - Identity values for instances held in a session
//!
//! Supports integer, UUID, text and composite primary keys. A `PrimaryKey` is
//! always an ordered tuple of `KeyValue`s matching the entity's primary-key
//! attribute list, so single and composite keys share one representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One component of a primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    /// Integer key component
    Int(i64),
    /// UUID key component
    Uuid(Uuid),
    /// Text key component
    Text(String),
}

impl KeyValue {
    /// Convert a scalar JSON value into a key component.
    ///
    /// Strings that parse as UUIDs become `Uuid` components so keys read from
    /// rows compare equal to keys built from `Uuid` values.
    /// Returns `None` for values that cannot identify a row (null, floats,
    /// booleans, arrays, objects).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(KeyValue::Int),
            Value::String(s) => Some(
                Uuid::parse_str(s)
                    .map(KeyValue::Uuid)
                    .unwrap_or_else(|_| KeyValue::Text(s.clone())),
            ),
            _ => None,
        }
    }

    /// Convert back into a JSON value
    pub fn to_value(&self) -> Value {
        match self {
            KeyValue::Int(id) => Value::from(*id),
            KeyValue::Uuid(id) => Value::String(id.to_string()),
            KeyValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Check whether a JSON value designates this key component
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (KeyValue::Int(id), Value::Number(n)) => n.as_i64() == Some(*id),
            (KeyValue::Uuid(id), Value::String(s)) => {
                Uuid::parse_str(s).map_or(false, |u| u == *id)
            }
            (KeyValue::Text(text), Value::String(s)) => text == s,
            _ => false,
        }
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Int(id) => write!(f, "{}", id),
            KeyValue::Uuid(id) => write!(f, "{}", id),
            KeyValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(id: i64) -> Self {
        KeyValue::Int(id)
    }
}

impl From<i32> for KeyValue {
    fn from(id: i32) -> Self {
        KeyValue::Int(id as i64)
    }
}

impl From<Uuid> for KeyValue {
    fn from(id: Uuid) -> Self {
        KeyValue::Uuid(id)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Text(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::Text(s)
    }
}

/// Primary key of a persistent instance: one `KeyValue` per key attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey(Vec<KeyValue>);

impl PrimaryKey {
    /// Create a key from its components, in primary-key attribute order
    pub fn new(parts: Vec<KeyValue>) -> Self {
        Self(parts)
    }

    /// Create a single-column key
    pub fn single(part: impl Into<KeyValue>) -> Self {
        Self(vec![part.into()])
    }

    /// Build a key from JSON values; `None` if any component is not a valid key value
    pub fn from_values<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        values
            .into_iter()
            .map(KeyValue::from_value)
            .collect::<Option<Vec<_>>>()
            .filter(|parts| !parts.is_empty())
            .map(Self)
    }

    /// Key components in attribute order
    pub fn parts(&self) -> &[KeyValue] {
        &self.0
    }

    /// Key components as JSON values, used as bound query parameters
    pub fn to_values(&self) -> Vec<Value> {
        self.0.iter().map(KeyValue::to_value).collect()
    }

    /// Number of key components
    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|part| part.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

impl From<i64> for PrimaryKey {
    fn from(id: i64) -> Self {
        PrimaryKey::single(id)
    }
}

impl From<i32> for PrimaryKey {
    fn from(id: i32) -> Self {
        PrimaryKey::single(id)
    }
}

impl From<Uuid> for PrimaryKey {
    fn from(id: Uuid) -> Self {
        PrimaryKey::single(id)
    }
}

impl From<&str> for PrimaryKey {
    fn from(id: &str) -> Self {
        PrimaryKey::single(id)
    }
}
