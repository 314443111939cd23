//! Conversion between JSON record values and `SQLite` storage classes.
//!
//! | Field type | Storage |
//! |------------|---------|
//! | UUID, TEXT, TIMESTAMP | TEXT |
//! | INTEGER, BOOLEAN | INTEGER |
//! | FLOAT | REAL |
//! | JSON, VECTOR | TEXT holding serialized JSON |
//! | BLOB | BLOB (hex string in records) |

use crate::models::Record;
use crate::schema::{FieldType, TableDefinition};
use crate::{Error, Result};
use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Encodes a record value for a column of `field_type`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the value cannot be stored in the
/// column.
pub fn encode(field_type: FieldType, value: &Value) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    let encoded = match field_type {
        FieldType::Json | FieldType::Vector => Some(SqlValue::Text(value.to_string())),
        FieldType::Boolean => value.as_bool().map(|b| SqlValue::Integer(i64::from(b))),
        FieldType::Integer => value.as_i64().map(SqlValue::Integer),
        FieldType::Float => value.as_f64().map(SqlValue::Real),
        FieldType::Uuid | FieldType::Text | FieldType::Timestamp => {
            value.as_str().map(|s| SqlValue::Text(s.to_string()))
        },
        FieldType::Blob => value
            .as_str()
            .map(|s| SqlValue::Blob(hex::decode(s).unwrap_or_else(|_| s.as_bytes().to_vec()))),
    };
    encoded.ok_or_else(|| {
        Error::InvalidInput(format!(
            "cannot store {value} in a {field_type} column"
        ))
    })
}

/// Decodes a stored value of a column of `field_type`.
#[must_use]
pub fn decode(field_type: Option<FieldType>, value: ValueRef<'_>) -> Value {
    match (field_type, value) {
        (_, ValueRef::Null) => Value::Null,
        (Some(FieldType::Boolean), ValueRef::Integer(i)) => Value::Bool(i != 0),
        (Some(FieldType::Json | FieldType::Vector), ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
        },
        (_, ValueRef::Integer(i)) => Value::from(i),
        (_, ValueRef::Real(f)) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        (_, ValueRef::Text(bytes)) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        (_, ValueRef::Blob(bytes)) => Value::String(hex::encode(bytes)),
    }
}

/// Encodes the value of `column` on `table`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for unknown columns or unstorable values.
pub fn encode_column(table: &TableDefinition, column: &str, value: &Value) -> Result<SqlValue> {
    let field = table.field(column).ok_or_else(|| {
        Error::InvalidInput(format!("unknown column '{column}' on table '{}'", table.name))
    })?;
    encode(field.field_type, value)
}

/// Reads a full row of `table` into a record.
///
/// # Errors
///
/// Returns a `rusqlite` error if a column cannot be read.
pub fn decode_row(table: &TableDefinition, columns: &[String], row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, name) in columns.iter().enumerate() {
        let field_type = table.field(name).map(|f| f.field_type);
        record.insert(name.clone(), decode(field_type, row.get_ref(idx)?));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_by_type() {
        assert_eq!(
            encode(FieldType::Boolean, &json!(true)).unwrap(),
            SqlValue::Integer(1)
        );
        assert_eq!(
            encode(FieldType::Json, &json!({"a": 1})).unwrap(),
            SqlValue::Text("{\"a\":1}".to_string())
        );
        assert_eq!(
            encode(FieldType::Vector, &json!([0.5, 1.0])).unwrap(),
            SqlValue::Text("[0.5,1.0]".to_string())
        );
        assert_eq!(encode(FieldType::Text, &Value::Null).unwrap(), SqlValue::Null);
        assert!(encode(FieldType::Integer, &json!("seven")).is_err());
    }

    #[test]
    fn test_decode_restores_json_types() {
        assert_eq!(
            decode(Some(FieldType::Boolean), ValueRef::Integer(0)),
            json!(false)
        );
        assert_eq!(
            decode(Some(FieldType::Json), ValueRef::Text(b"[1,2]")),
            json!([1, 2])
        );
        assert_eq!(
            decode(Some(FieldType::Json), ValueRef::Text(b"not json")),
            json!("not json")
        );
        assert_eq!(decode(None, ValueRef::Real(1.5)), json!(1.5));
        assert_eq!(decode(Some(FieldType::Blob), ValueRef::Blob(&[0xab, 0x01])), json!("ab01"));
    }
}
