//! SQL rendering for `SQLite` backends.
//!
//! Turns a backend-neutral [`Select`] into parameterized SQL. Identifiers
//! come from static table definitions and are always quoted; values are
//! always bound. JSON containment has no portable SQL form, so selects with
//! a [`Filter::Contains`] are rendered without it (and without their window)
//! and finished in memory by the caller.

use super::codec::{encode, encode_column};
use crate::models::Record;
use crate::schema::TableDefinition;
use crate::storage::query::{Filter, Select};
use crate::{Error, Result};
use rusqlite::types::Value as SqlValue;
use std::fmt::Write;

/// A SQL string with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Returns the parameters as `ToSql` references.
    #[must_use]
    pub fn param_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p as &dyn rusqlite::ToSql).collect()
    }
}

/// Quotes an identifier.
#[must_use]
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Renders the SQL-expressible filters of `select` as a WHERE clause.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a filter names an unknown column or
/// carries an unstorable value.
pub fn where_clause(select: &Select) -> Result<(String, Vec<SqlValue>)> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for filter in &select.filters {
        let column = filter.column();
        if !select.table.has_column(column) {
            return Err(Error::InvalidInput(format!(
                "unknown column '{column}' on table '{}'",
                select.table.name
            )));
        }
        let quoted = quote(column);
        match filter {
            Filter::Eq(_, value) => {
                conditions.push(format!("{quoted} = ?"));
                params.push(encode_column(select.table, column, value)?);
            },
            Filter::Ne(_, value) => {
                conditions.push(format!("{quoted} IS NOT ?"));
                params.push(encode_column(select.table, column, value)?);
            },
            Filter::IsNull(_) => conditions.push(format!("{quoted} IS NULL")),
            Filter::NotNull(_) => conditions.push(format!("{quoted} IS NOT NULL")),
            Filter::Contains(..) => {},
        }
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    Ok((clause, params))
}

/// Renders `SELECT *` for `select`.
///
/// # Errors
///
/// See [`where_clause`].
pub fn select_sql(select: &Select) -> Result<Statement> {
    let (clause, mut params) = where_clause(select)?;
    let mut sql = format!("SELECT * FROM {}{clause}", quote(select.table.name));

    if !select.order.is_empty() {
        let keys: Vec<String> = select
            .order
            .iter()
            .map(|o| {
                format!(
                    "{} {}",
                    quote(o.column),
                    if o.descending { "DESC" } else { "ASC" }
                )
            })
            .collect();
        let _ = write!(sql, " ORDER BY {}", keys.join(", "));
    }

    if !select.has_containment() {
        let window = select.window;
        if window.limit.is_some() || window.offset > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(window.limit.map_or(-1, to_i64)));
            params.push(SqlValue::Integer(to_i64(window.offset)));
        }
    }

    Ok(Statement { sql, params })
}

/// Renders `SELECT COUNT(*)` for a select without containment filters.
///
/// # Errors
///
/// See [`where_clause`].
pub fn count_sql(select: &Select) -> Result<Statement> {
    let (clause, params) = where_clause(select)?;
    Ok(Statement {
        sql: format!("SELECT COUNT(*) FROM {}{clause}", quote(select.table.name)),
        params,
    })
}

/// Renders `DELETE` for a select without containment filters.
///
/// The window is ignored.
///
/// # Errors
///
/// See [`where_clause`].
pub fn delete_sql(select: &Select) -> Result<Statement> {
    let (clause, params) = where_clause(select)?;
    Ok(Statement {
        sql: format!("DELETE FROM {}{clause}", quote(select.table.name)),
        params,
    })
}

/// Renders an `INSERT` of every column present in a prepared row.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for unstorable values.
pub fn insert_sql(table: &TableDefinition, row: &Record) -> Result<Statement> {
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for field in table.fields {
        if let Some(value) = row.get(field.name) {
            columns.push(quote(field.name));
            params.push(encode(field.field_type, value)?);
        }
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote(table.name),
            columns.join(", ")
        ),
        params,
    })
}

/// Renders an `UPDATE` of every non-key column present in a prepared row.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the row lacks its primary key or holds
/// unstorable values.
pub fn update_sql(table: &TableDefinition, row: &Record) -> Result<Statement> {
    let pk = table.primary_key();
    let key = row
        .get(pk.name)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::InvalidInput(format!("{} requires '{}'", table.name, pk.name)))?;

    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for field in table.fields.iter().filter(|f| f.name != pk.name) {
        if let Some(value) = row.get(field.name) {
            assignments.push(format!("{} = ?", quote(field.name)));
            params.push(encode(field.field_type, value)?);
        }
    }
    params.push(encode(pk.field_type, key)?);

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(table.name),
            assignments.join(", "),
            quote(pk.name)
        ),
        params,
    })
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListOptions;
    use crate::schema::tables;
    use crate::storage::plan;
    use crate::storage::query::order;
    use serde_json::{Value, json};

    #[test]
    fn test_quote_escapes_quotes() {
        assert_eq!(quote("url"), "\"url\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_select_with_window() {
        let select = plan::pages_by_source("s1", ListOptions::all().with_limit(10).with_offset(5));
        let stmt = select_sql(&select).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"page_metadata\" WHERE \"source_id\" = ? ORDER BY \"url\" ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("s1".to_string()),
                SqlValue::Integer(10),
                SqlValue::Integer(5)
            ]
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let select = Select::from(&tables::SETTINGS).window(ListOptions::all().with_offset(2));
        let stmt = select_sql(&select).unwrap();
        assert!(stmt.sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(stmt.params, vec![SqlValue::Integer(-1), SqlValue::Integer(2)]);
    }

    #[test]
    fn test_containment_is_left_to_the_caller() {
        let mut needle = Record::new();
        needle.insert("knowledge_type".to_string(), json!("technical"));
        let select = Select::from(&tables::DOCUMENTS)
            .contains("metadata", Some(&needle))
            .order_by(order::BY_URL_CHUNK)
            .limit(3);
        let stmt = select_sql(&select).unwrap();
        assert!(!stmt.sql.contains("WHERE"));
        assert!(!stmt.sql.contains("LIMIT"));
    }

    #[test]
    fn test_boolean_and_null_filters() {
        let select = plan::tasks(&crate::models::TaskFilter::new());
        let stmt = select_sql(&select).unwrap();
        assert!(stmt.sql.contains("\"archived\" = ?"));
        assert_eq!(stmt.params, vec![SqlValue::Integer(0)]);

        let select = plan::document_versions(None, Some("docs"));
        let stmt = select_sql(&select).unwrap();
        assert!(stmt.sql.contains("\"project_id\" IS NULL"));
        assert!(stmt.sql.contains("ORDER BY \"version_number\" DESC"));
    }

    #[test]
    fn test_unknown_filter_column_is_rejected() {
        let select = Select::from(&tables::TASKS).eq("nope", "x");
        assert!(matches!(select_sql(&select), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_insert_and_update() {
        let row = match json!({"key": "k", "value": "v", "id": "1", "is_encrypted": false}) {
            Value::Object(map) => map,
            _ => Record::new(),
        };
        let insert = insert_sql(&tables::SETTINGS, &row).unwrap();
        assert_eq!(
            insert.sql,
            "INSERT INTO \"settings\" (\"id\", \"key\", \"value\", \"is_encrypted\") VALUES (?, ?, ?, ?)"
        );

        let update = update_sql(&tables::SETTINGS, &row).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE \"settings\" SET \"key\" = ?, \"value\" = ?, \"is_encrypted\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(update.params.last(), Some(&SqlValue::Text("1".to_string())));
    }
}
