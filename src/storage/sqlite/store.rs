//! Row-level operations over one `SQLite` connection.
//!
//! These run inside `spawn_blocking` with the connection lock held. Callers
//! that need several statements to succeed together use
//! [`with_transaction`](super::connection::with_transaction) around them.

use super::codec::decode_row;
use super::connection::translate;
use super::sql::{Statement, count_sql, delete_sql, insert_sql, select_sql, update_sql};
use crate::Result;
use crate::models::Record;
use crate::schema::TableDefinition;
use crate::storage::plan::{self, CascadeStep};
use crate::storage::query::Select;
use crate::storage::record::{prepare_update, prepare_upsert, primary_key_value};
use rusqlite::Connection;

/// Runs a select, finishing containment filters and windows in memory.
pub fn select(conn: &Connection, select: &Select, operation: &str) -> Result<Vec<Record>> {
    let stmt = select_sql(select)?;
    let rows = query(conn, select.table, &stmt, operation)?;
    if select.has_containment() {
        Ok(select.apply(rows))
    } else {
        Ok(rows)
    }
}

/// Returns the first row of a select.
pub fn first(conn: &Connection, select: Select, operation: &str) -> Result<Option<Record>> {
    let select = select.limit(1);
    Ok(self::select(conn, &select, operation)?.into_iter().next())
}

/// Counts rows matching a select's filters.
pub fn count(conn: &Connection, select: &Select, operation: &str) -> Result<u64> {
    if select.has_containment() {
        let mut unwindowed = select.clone();
        unwindowed.window = crate::models::ListOptions::all();
        let n = self::select(conn, &unwindowed, operation)?.len();
        return Ok(u64::try_from(n).unwrap_or(u64::MAX));
    }
    let stmt = count_sql(select)?;
    let n: i64 = conn
        .query_row(&stmt.sql, stmt.param_refs().as_slice(), |row| row.get(0))
        .map_err(|e| translate(operation, &e))?;
    Ok(u64::try_from(n).unwrap_or_default())
}

/// Inserts a prepared row.
pub fn insert(conn: &Connection, table: &TableDefinition, row: Record, operation: &str) -> Result<Record> {
    execute(conn, &insert_sql(table, &row)?, operation)?;
    Ok(row)
}

/// Rewrites an existing row by primary key.
pub fn replace(conn: &Connection, table: &TableDefinition, row: Record, operation: &str) -> Result<Record> {
    execute(conn, &update_sql(table, &row)?, operation)?;
    Ok(row)
}

/// Deletes every row matching the select's filters (windows are ignored).
pub fn delete(conn: &Connection, select: &Select, operation: &str) -> Result<u64> {
    if !select.has_containment() {
        return execute(conn, &delete_sql(select)?, operation);
    }
    let mut unwindowed = select.clone();
    unwindowed.window = crate::models::ListOptions::all();
    let mut deleted = 0;
    for row in self::select(conn, &unwindowed, operation)? {
        if let Some(key) = primary_key_value(select.table, &row) {
            deleted += execute(conn, &delete_sql(&plan::by_key(select.table, key))?, operation)?;
        }
    }
    Ok(deleted)
}

/// Inserts `incoming`, or merges it into the row `existing` selects.
pub fn upsert(conn: &Connection, existing: Select, incoming: Record, operation: &str) -> Result<Record> {
    let table = existing.table;
    let current = first(conn, existing, operation)?;
    let row = prepare_upsert(table, current.as_ref(), incoming)?;
    if current.is_some() {
        replace(conn, table, row, operation)
    } else {
        insert(conn, table, row, operation)
    }
}

/// Merges `updates` into the row with primary key `key`.
pub fn update(
    conn: &Connection,
    table: &'static TableDefinition,
    key: &str,
    updates: Record,
    operation: &str,
) -> Result<Option<Record>> {
    let Some(existing) = first(conn, plan::by_key(table, key), operation)? else {
        return Ok(None);
    };
    let row = prepare_update(table, &existing, updates)?;
    replace(conn, table, row, operation).map(Some)
}

/// Deletes children in order, then the parent.
///
/// Must run inside a transaction for the abort-on-failure guarantee.
pub fn cascade(
    conn: &Connection,
    steps: &[CascadeStep],
    parent: &'static TableDefinition,
    key: &str,
    operation: &str,
) -> Result<bool> {
    for step in steps {
        let removed = delete(conn, &step.select(key), operation)?;
        tracing::trace!(table = step.table.name, removed, "cascade step");
    }
    Ok(delete(conn, &plan::by_key(parent, key), operation)? > 0)
}

fn query(conn: &Connection, table: &TableDefinition, stmt: &Statement, operation: &str) -> Result<Vec<Record>> {
    let mut prepared = conn
        .prepare_cached(&stmt.sql)
        .map_err(|e| translate(operation, &e))?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let rows = prepared
        .query_map(stmt.param_refs().as_slice(), |row| decode_row(table, &columns, row))
        .map_err(|e| translate(operation, &e))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| translate(operation, &e))
}

fn execute(conn: &Connection, stmt: &Statement, operation: &str) -> Result<u64> {
    let n = conn
        .execute(&stmt.sql, stmt.param_refs().as_slice())
        .map_err(|e| translate(operation, &e))?;
    Ok(u64::try_from(n).unwrap_or(u64::MAX))
}
