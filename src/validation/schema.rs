//! Schema compatibility checks against the type-mapping matrix.
//!
//! No database is contacted: the canonical table definitions are compared
//! with [`type_mapping`] for each target, which makes this usable as a
//! pre-flight check before provisioning a backend.

use crate::schema::{
    DatabaseType, FieldDefault, FieldDefinition, FieldType, TableDefinition, canonical_tables,
    type_mapping,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Compatibility of one table with one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Logical table name.
    pub table_name: String,
    /// Target database.
    pub database_type: DatabaseType,
    /// False iff some field has no native type and no fallback.
    pub compatible: bool,
    /// Blocking problems.
    pub issues: Vec<String>,
    /// Degraded but workable representations.
    pub warnings: Vec<String>,
    /// Recommended native types or setup steps.
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    fn new(table: &TableDefinition, database: DatabaseType) -> Self {
        Self {
            table_name: table.name.to_string(),
            database_type: database,
            compatible: true,
            issues: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Validates the canonical schema against database type systems.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseSchemaValidator {
    tables: &'static [TableDefinition],
}

impl Default for DatabaseSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseSchemaValidator {
    /// Validator over the six canonical tables.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: canonical_tables(),
        }
    }

    /// Validator over a custom table set.
    #[must_use]
    pub const fn with_tables(tables: &'static [TableDefinition]) -> Self {
        Self { tables }
    }

    /// Checks every field of one table.
    #[must_use]
    pub fn validate_table(&self, table: &TableDefinition, database: DatabaseType) -> ValidationResult {
        let mut result = ValidationResult::new(table, database);
        for field in table.fields {
            check_field(&mut result, field, database);
        }
        result
    }

    /// Checks every table for one database.
    #[must_use]
    pub fn validate_adapter(&self, database: DatabaseType) -> Vec<ValidationResult> {
        let results: Vec<ValidationResult> = self
            .tables
            .iter()
            .map(|table| self.validate_table(table, database))
            .collect();
        let incompatible = results.iter().filter(|r| !r.compatible).count();
        tracing::debug!(
            database = database.as_str(),
            tables = results.len(),
            incompatible,
            "validated schema"
        );
        results
    }

    /// Checks every table for every known database, keyed by database name.
    #[must_use]
    pub fn validate_all_adapters(&self) -> BTreeMap<String, Vec<ValidationResult>> {
        DatabaseType::ALL
            .iter()
            .map(|db| (db.as_str().to_string(), self.validate_adapter(*db)))
            .collect()
    }

    /// Renders `CREATE TABLE`/`CREATE INDEX` DDL for `target`.
    ///
    /// Columns whose type falls back on the target are annotated with the
    /// fallback's limitations.
    #[must_use]
    pub fn generate_migration_script(&self, source: DatabaseType, target: DatabaseType) -> String {
        let mut script = String::new();
        let _ = writeln!(script, "-- Archon schema migration: {source} -> {target}");
        let _ = writeln!(script, "-- Generated by archon-dal {}", env!("CARGO_PKG_VERSION"));
        script.push('\n');
        if target.is_postgres_family() {
            script.push_str("CREATE EXTENSION IF NOT EXISTS vector;\n\n");
        }
        for table in self.tables {
            render_table(&mut script, table, target);
            for index in table.indexes {
                let unique = if index.unique { "UNIQUE " } else { "" };
                let _ = writeln!(
                    script,
                    "CREATE {unique}INDEX {}{} ON {} ({});",
                    if target == DatabaseType::Mysql { "" } else { "IF NOT EXISTS " },
                    index.name,
                    ident(table.name, target),
                    index
                        .columns
                        .iter()
                        .map(|c| ident(c, target))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            script.push('\n');
        }
        script
    }
}

fn check_field(result: &mut ValidationResult, field: &FieldDefinition, database: DatabaseType) {
    let mapping = type_mapping(field.field_type, database);
    let name = field.name;
    let field_type = field.field_type;

    if !mapping.supported {
        if mapping.fallback {
            result.warnings.push(format!(
                "Field '{name}': {field_type} has no native type on {database}, stored as {} ({})",
                mapping.native_type,
                mapping.limitations.join("; ")
            ));
            if field_type == FieldType::Vector {
                result.suggestions.push(format!(
                    "Field '{name}': enable native vector support (e.g. pgvector) for server-side similarity search"
                ));
            }
        } else {
            result.compatible = false;
            result.issues.push(format!(
                "Field '{name}': {field_type} is not supported on {database}"
            ));
        }
        return;
    }

    if field_type == FieldType::Json {
        for limitation in mapping.limitations {
            result
                .warnings
                .push(format!("Field '{name}': JSON limitation on {database}: {limitation}"));
        }
    }

    if field_type == FieldType::Uuid && field.primary_key {
        match database {
            DatabaseType::Sqlite => result.suggestions.push(format!(
                "Field '{name}': use VARCHAR(36) for UUID primary keys on {database}"
            )),
            DatabaseType::Mysql => result.suggestions.push(format!(
                "Field '{name}': use CHAR(36) for UUID primary keys on {database}"
            )),
            DatabaseType::Supabase | DatabaseType::Postgresql => {},
        }
    }
}

fn render_table(script: &mut String, table: &TableDefinition, target: DatabaseType) {
    let _ = writeln!(script, "CREATE TABLE IF NOT EXISTS {} (", ident(table.name, target));
    let last = table.fields.len().saturating_sub(1);
    for (i, field) in table.fields.iter().enumerate() {
        let mapping = type_mapping(field.field_type, target);
        let mut column = format!("    {} {}", ident(field.name, target), mapping.render(field, target));
        if field.primary_key {
            column.push_str(" PRIMARY KEY");
        } else if !field.nullable {
            column.push_str(" NOT NULL");
        }
        if field.unique && !field.primary_key {
            column.push_str(" UNIQUE");
        }
        if let Some(default) = render_default(field, target) {
            let _ = write!(column, " DEFAULT {default}");
        }
        if i != last {
            column.push(',');
        }
        if mapping.fallback {
            let _ = write!(column, " -- fallback: {}", mapping.limitations.join("; "));
        }
        script.push_str(&column);
        script.push('\n');
    }
    script.push_str(");\n");
}

/// MySQL reserves `key`, so its identifiers are always backquoted.
fn ident(name: &str, target: DatabaseType) -> String {
    if target == DatabaseType::Mysql {
        format!("`{name}`")
    } else {
        name.to_string()
    }
}

fn render_default(field: &FieldDefinition, target: DatabaseType) -> Option<String> {
    let postgres = target.is_postgres_family();
    if field.primary_key && field.field_type == FieldType::Uuid && postgres {
        return Some("gen_random_uuid()".to_string());
    }
    let default = field.default?;
    let rendered = match default {
        FieldDefault::Integer(n) => n.to_string(),
        FieldDefault::Bool(b) if postgres => b.to_string().to_uppercase(),
        FieldDefault::Bool(b) => u8::from(b).to_string(),
        FieldDefault::Text(s) => format!("'{}'", s.replace('\'', "''")),
        FieldDefault::EmptyObject | FieldDefault::EmptyArray => {
            let literal = if default == FieldDefault::EmptyObject { "{}" } else { "[]" };
            match target {
                DatabaseType::Supabase | DatabaseType::Postgresql => format!("'{literal}'::jsonb"),
                DatabaseType::Mysql => format!("('{literal}')"),
                DatabaseType::Sqlite => format!("'{literal}'"),
            }
        },
        FieldDefault::CurrentTimestamp => match target {
            DatabaseType::Supabase | DatabaseType::Postgresql => "NOW()".to_string(),
            DatabaseType::Mysql => "CURRENT_TIMESTAMP(6)".to_string(),
            DatabaseType::Sqlite => "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))".to_string(),
        },
    };
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables;

    #[test]
    fn test_supabase_is_fully_native() {
        let results = DatabaseSchemaValidator::new().validate_adapter(DatabaseType::Supabase);
        assert_eq!(results.len(), 6);
        for result in &results {
            assert!(result.compatible);
            assert!(result.issues.is_empty());
            assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        }
    }

    #[test]
    fn test_sqlite_vector_fields_warn_but_stay_compatible() {
        let validator = DatabaseSchemaValidator::new();
        let documents = validator.validate_table(&tables::DOCUMENTS, DatabaseType::Sqlite);
        assert!(documents.compatible);
        assert!(documents.warnings.iter().any(|w| w.contains("'embedding'")));
        assert!(documents.warnings.iter().any(|w| w.contains("JSON limitation")));
        assert!(documents.suggestions.iter().any(|s| s.contains("enable native vector support")));
        assert!(documents.suggestions.iter().any(|s| s.contains("VARCHAR(36)")));
    }

    #[test]
    fn test_mysql_uuid_suggestion() {
        let result = DatabaseSchemaValidator::new().validate_table(&tables::TASKS, DatabaseType::Mysql);
        assert!(result.suggestions.iter().any(|s| s.contains("CHAR(36)")));
    }

    #[test]
    fn test_validate_all_adapters_covers_every_database() {
        let all = DatabaseSchemaValidator::new().validate_all_adapters();
        let keys: Vec<_> = all.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["mysql", "postgresql", "sqlite", "supabase"]);
        assert!(all.values().all(|results| results.len() == 6));
    }

    #[test]
    fn test_postgres_script_uses_vector_type() {
        let script = DatabaseSchemaValidator::new()
            .generate_migration_script(DatabaseType::Sqlite, DatabaseType::Postgresql);
        assert!(script.starts_with("-- Archon schema migration: sqlite -> postgresql"));
        assert!(script.contains("CREATE EXTENSION IF NOT EXISTS vector;"));
        assert!(script.contains("embedding VECTOR(1536)"));
        assert!(script.contains("id UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(script.contains("metadata JSONB NOT NULL DEFAULT '{}'::jsonb"));
        assert!(script.contains("key VARCHAR(255) NOT NULL UNIQUE"));
    }

    #[test]
    fn test_sqlite_script_annotates_fallbacks() {
        let script = DatabaseSchemaValidator::new()
            .generate_migration_script(DatabaseType::Supabase, DatabaseType::Sqlite);
        assert!(!script.contains("CREATE EXTENSION"));
        assert!(!script.contains("VECTOR("));
        assert!(script.contains("embedding TEXT, -- fallback:"));
    }

    #[test]
    fn test_mysql_script_quotes_identifiers() {
        let script = DatabaseSchemaValidator::new()
            .generate_migration_script(DatabaseType::Supabase, DatabaseType::Mysql);
        assert!(script.contains("`key` VARCHAR(255) NOT NULL UNIQUE"));
        assert!(script.contains("CREATE INDEX idx_tasks_status ON `tasks` (`status`);"));
        assert!(script.contains("`metadata` JSON NOT NULL DEFAULT ('{}')"));
    }

    #[test]
    fn test_sqlite_script_executes() {
        let script = DatabaseSchemaValidator::new()
            .generate_migration_script(DatabaseType::Supabase, DatabaseType::Sqlite);
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&script).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }
}
