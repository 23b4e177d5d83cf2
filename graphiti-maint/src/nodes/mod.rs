//! Node types stored in a Graphiti graph, plus the property-map helpers
//! shared with [`crate::edges`].
//!
//! Only [`entity::EntityNode`] carries vectors that maintenance cares about.

pub mod entity;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{MaintError, Result};

/// Property map of a node or relationship.
pub type Properties = serde_json::Map<String, Value>;

/// Encode a vector as a JSON array of numbers.
pub fn vector_to_value(v: &[f32]) -> Value {
    Value::Array(v.iter().map(|x| Value::from(f64::from(*x))).collect())
}

/// Decode an optional vector property; `null` and absent both mean `None`.
pub fn optional_vector(props: &Properties, key: &str) -> Result<Option<Vec<f32>>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_f64().map(|x| x as f32).ok_or_else(|| {
                    MaintError::DataShape(format!("'{key}' contains a non-numeric element"))
                })
            })
            .collect::<Result<Vec<f32>>>()
            .map(Some),
        Some(other) => Err(MaintError::DataShape(format!(
            "'{key}' should be a list, found {}",
            json_type(other)
        ))),
    }
}

/// Length of the vector stored under `key`: `None` when absent or null,
/// `Some(0)` for values that are not lists.
pub fn vector_len(props: &Properties, key: &str) -> Option<usize> {
    match props.get(key)? {
        Value::Null => None,
        Value::Array(items) => Some(items.len()),
        _ => Some(0),
    }
}

pub(crate) fn required_str(props: &Properties, key: &str) -> Result<String> {
    match props.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(MaintError::DataShape(format!("missing '{key}'"))),
        Some(other) => Err(MaintError::DataShape(format!(
            "'{key}' should be a string, found {}",
            json_type(other)
        ))),
    }
}

pub(crate) fn optional_str(props: &Properties, key: &str) -> Result<Option<String>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(props, key).map(Some),
    }
}

pub(crate) fn required_uuid(props: &Properties, key: &str) -> Result<Uuid> {
    let raw = required_str(props, key)?;
    Uuid::parse_str(&raw).map_err(|e| MaintError::DataShape(format!("'{key}' is not a uuid: {e}")))
}

pub(crate) fn required_datetime(props: &Properties, key: &str) -> Result<DateTime<Utc>> {
    let raw = required_str(props, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MaintError::DataShape(format!("'{key}' is not an RFC 3339 timestamp: {e}")))
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
