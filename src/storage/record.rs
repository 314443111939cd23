//! Record projection and preparation.
//!
//! Every backend pushes incoming records through these helpers before
//! writing, so unknown keys, defaults, generated ids and timestamps behave
//! the same whether the row lands in SQLite, PostgREST or memory.

use super::merge::merge_record;
use crate::models::Record;
use crate::models::json_type_name;
use crate::schema::{FieldDefinition, FieldType, TableDefinition};
use crate::{Error, Result};
use serde_json::Value;

/// Column stamped on every update.
pub const UPDATED_AT: &str = "updated_at";
/// Column stamped once on insert.
pub const CREATED_AT: &str = "created_at";

/// Keeps only the keys that are columns of `table`.
#[must_use]
pub fn project(table: &TableDefinition, record: Record) -> Record {
    record
        .into_iter()
        .filter(|(key, _)| table.has_column(key))
        .collect()
}

/// Prepares a record for insertion.
///
/// Projects onto the table's columns, generates a UUID primary key when the
/// key column is a UUID and absent, fills defaults, and checks NOT NULL and
/// value types.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a required column is missing or a value
/// has the wrong JSON type.
pub fn prepare_insert(table: &TableDefinition, record: Record) -> Result<Record> {
    let mut row = project(table, record);
    let pk = table.primary_key();

    if is_absent(row.get(pk.name)) {
        if pk.field_type == FieldType::Uuid {
            row.insert(
                pk.name.to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        } else {
            return Err(Error::InvalidInput(format!(
                "{} requires '{}'",
                table.name, pk.name
            )));
        }
    }

    for field in table.fields {
        if !is_absent(row.get(field.name)) {
            continue;
        }
        if let Some(default) = field.default {
            row.insert(field.name.to_string(), default.to_value());
        } else if !field.nullable {
            return Err(Error::InvalidInput(format!(
                "{} requires '{}'",
                table.name, field.name
            )));
        }
    }

    check_types(table, &row)?;
    Ok(row)
}

/// Merges `updates` onto `existing`.
///
/// The primary key and `created_at` are immutable; `updated_at` is refreshed.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a merged value has the wrong type or a
/// NOT NULL column is set to null.
pub fn prepare_update(table: &TableDefinition, existing: &Record, updates: Record) -> Result<Record> {
    let mut updates = project(table, updates);
    updates.remove(table.primary_key().name);
    updates.remove(CREATED_AT);

    let mut merged = merge_record(existing, updates);
    touch(table, &mut merged);

    for field in table.fields {
        if !field.nullable && matches!(merged.get(field.name), Some(Value::Null)) {
            return Err(Error::InvalidInput(format!(
                "{}.{} cannot be null",
                table.name, field.name
            )));
        }
    }
    check_types(table, &merged)?;
    Ok(merged)
}

/// Inserts or merges depending on whether a row already exists.
///
/// # Errors
///
/// Propagates [`prepare_insert`] and [`prepare_update`] errors.
pub fn prepare_upsert(
    table: &TableDefinition,
    existing: Option<&Record>,
    incoming: Record,
) -> Result<Record> {
    match existing {
        Some(existing) => prepare_update(table, existing, incoming),
        None => prepare_insert(table, incoming),
    }
}

/// Refreshes `updated_at` if the table has one.
pub fn touch(table: &TableDefinition, row: &mut Record) {
    if table.has_column(UPDATED_AT) {
        row.insert(
            UPDATED_AT.to_string(),
            Value::String(crate::current_timestamp()),
        );
    }
}

/// Removes the named columns from a record.
pub fn strip(row: &mut Record, columns: &[&str]) {
    for column in columns {
        row.remove(*column);
    }
}

/// Returns a string column value.
#[must_use]
pub fn str_field<'a>(row: &'a Record, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Returns a required string column.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the column is missing or not a string.
pub fn required_str<'a>(row: &'a Record, table: &str, key: &str) -> Result<&'a str> {
    str_field(row, key).ok_or_else(|| Error::InvalidInput(format!("{table} requires '{key}'")))
}

/// Returns the primary key value of a prepared row.
#[must_use]
pub fn primary_key_value<'a>(table: &TableDefinition, row: &'a Record) -> Option<&'a str> {
    str_field(row, table.primary_key().name)
}

fn is_absent(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_null)
}

fn check_types(table: &TableDefinition, row: &Record) -> Result<()> {
    for (key, value) in row {
        let Some(field) = table.field(key) else {
            continue;
        };
        if value.is_null() || value_matches(field, value) {
            continue;
        }
        return Err(Error::InvalidInput(format!(
            "{}.{} expects {}, got {}",
            table.name,
            field.name,
            field.field_type,
            json_type_name(value)
        )));
    }
    Ok(())
}

fn value_matches(field: &FieldDefinition, value: &Value) -> bool {
    match field.field_type {
        FieldType::Uuid | FieldType::Text | FieldType::Timestamp => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Json => true,
        FieldType::Vector => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_number)),
        FieldType::Blob => value.is_string() || value.is_array(),
    }
}
