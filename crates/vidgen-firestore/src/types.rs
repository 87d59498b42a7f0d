//! Firestore REST API types and value conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// Used as the optimistic-lock token for precondition writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Typed read of a top-level field.
    pub fn field<T: FromFirestoreValue>(&self, name: &str) -> Option<T> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(name))
            .and_then(T::from_firestore_value)
    }

    /// Last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }
}

/// Convert a Rust value to a Firestore value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Arbitrary JSON, used for the opaque job metadata blob.
impl ToFirestoreValue for serde_json::Value {
    fn to_firestore_value(&self) -> Value {
        use serde_json::Value as Json;
        match self {
            Json::Null => Value::NullValue(()),
            Json::Bool(b) => Value::BooleanValue(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::IntegerValue(i.to_string()),
                None => Value::DoubleValue(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::StringValue(s.clone()),
            Json::Array(items) => Value::ArrayValue(ArrayValue {
                values: Some(items.iter().map(|v| v.to_firestore_value()).collect()),
            }),
            Json::Object(map) => Value::MapValue(MapValue {
                fields: Some(
                    map.iter()
                        .map(|(k, v)| (k.clone(), v.to_firestore_value()))
                        .collect(),
                ),
            }),
        }
    }
}

/// Convert a Firestore value to a Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) if *f >= 0.0 => Some(*f as u32),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) if *f >= 0.0 => Some(*f as u64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for f64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for serde_json::Value {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        use serde_json::Value as Json;
        Some(match value {
            Value::NullValue(()) => Json::Null,
            Value::BooleanValue(b) => Json::Bool(*b),
            Value::IntegerValue(s) => s.parse::<i64>().map(Json::from).ok()?,
            Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::TimestampValue(s) | Value::StringValue(s) => Json::String(s.clone()),
            Value::ArrayValue(array) => Json::Array(
                array
                    .values
                    .iter()
                    .flatten()
                    .filter_map(Self::from_firestore_value)
                    .collect(),
            ),
            Value::MapValue(map) => Json::Object(
                map.fields
                    .iter()
                    .flatten()
                    .filter_map(|(k, v)| Self::from_firestore_value(v).map(|j| (k.clone(), j)))
                    .collect(),
            ),
        })
    }
}
