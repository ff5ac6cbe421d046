//! Normalization of JSON row values into storage-native values
//!
//! The store has no boolean type, so `true`/`false` become `1`/`0`. Nested
//! arrays and objects are kept as their JSON text.

use serde::Serialize;
use serde_json::Value;

/// A value in the storage engine's native representation
///
/// Serializes untagged, so a stored row reads back as plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StorageValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl StorageValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }
}

impl std::fmt::Display for StorageValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageValue::Null => f.write_str("NULL"),
            StorageValue::Integer(i) => write!(f, "{}", i),
            StorageValue::Real(r) => write!(f, "{}", r),
            StorageValue::Text(s) => f.write_str(s),
        }
    }
}

/// Convert one JSON value into its storage representation
pub fn to_storage_value(value: &Value) -> StorageValue {
    match value {
        Value::Null => StorageValue::Null,
        Value::Bool(b) => StorageValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => StorageValue::Integer(i),
            // Past i64::MAX a REAL would round; keep the exact digits
            None if n.is_u64() => StorageValue::Text(n.to_string()),
            None => StorageValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => StorageValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => StorageValue::Text(value.to_string()),
    }
}

/// Like [`to_storage_value`], treating an absent value as `NULL`
pub fn to_storage_value_opt(value: Option<&Value>) -> StorageValue {
    value.map(to_storage_value).unwrap_or(StorageValue::Null)
}
