//! Shared value types.

use serde_json::Value;

/// A persisted record: field name to JSON value.
pub type Resource = serde_json::Map<String, Value>;

/// Extracts the textual index value at `path` from a record.
///
/// `path` may be dotted to reach into nested objects. Absent and `null`
/// values are not indexed.
#[must_use]
pub fn field_text(record: &Resource, path: &str) -> Option<String> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    match current {
        Value::Null => None,
        other => Some(value_text(other)),
    }
}

/// Renders a JSON value the way index tables store it.
///
/// Strings are used verbatim; everything else uses its JSON text.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
