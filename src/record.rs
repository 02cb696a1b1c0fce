//! Record identity.

use serde_json::{Map, Value};

/// A record as delivered by the REST API: a JSON object mutated in place
/// during normalization and then stored whole.
pub type Entity = Map<String, Value>;

/// External record id. WooCommerce uses integers, but the store key
/// preserves whatever JSON type the API sent, so `42` and `"42"` differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// Extract a usable id. Falsy values (`null`, `0`, `""`, `false`) and
    /// non-scalar ids count as missing.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(0) | None => None,
                Some(i) => Some(Self::Int(i)),
            },
            Value::String(s) if !s.is_empty() => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    pub fn of(entity: &Entity) -> Option<Self> {
        entity.get("id").and_then(Self::from_value)
    }

    /// Parse the key stored by [`RecordId::to_key`].
    pub fn from_key(key: &str) -> Option<Self> {
        serde_json::from_str::<Value>(key)
            .ok()
            .as_ref()
            .and_then(Self::from_value)
    }

    /// JSON encoding of the id, used as the store key.
    pub fn to_key(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Str(s) => Value::String(s.clone()).to_string(),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
