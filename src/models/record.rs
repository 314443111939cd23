//! Detached entity records.

use crate::{Error, Result};
use serde_json::Value;

/// A detached entity row.
///
/// Keys are column names of the logical table; values are JSON. Reads always
/// return an owned copy, so mutating a record never touches storage.
pub type Record = serde_json::Map<String, Value>;

/// Converts a JSON value into a [`Record`].
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the value is not a JSON object.
///
/// # Examples
///
/// ```
/// use archon_dal::models::record_from_json;
/// use serde_json::json;
///
/// let record = record_from_json(json!({"source_id": "s1"})).unwrap();
/// assert_eq!(record["source_id"], "s1");
/// assert!(record_from_json(json!([1, 2])).is_err());
/// ```
pub fn record_from_json(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

pub(crate) const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
