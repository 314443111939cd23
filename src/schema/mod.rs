//! Canonical schema definition.
//!
//! The backend-independent description of every table the repository
//! persists. It drives three things that must never disagree:
//!
//! - schema validation against each database's [`type_mapping`] matrix
//! - DDL generation for new backends
//! - record projection and default filling in every repository backend
//!
//! Only the six [`canonical_tables`] take part in compatibility validation;
//! [`storage_tables`] adds the bookkeeping tables the repository contract
//! also reads and writes.

pub mod tables;
pub mod type_mapping;

pub use tables::{canonical_tables, names, storage_table, storage_tables};
pub use type_mapping::{DatabaseType, TypeMapping, type_mapping};

use serde::Serialize;
use serde_json::Value;

/// Canonical column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// 128-bit identifier.
    Uuid,
    /// Unbounded UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// Double-precision float.
    Float,
    /// True/false.
    Boolean,
    /// Point in time (RFC 3339 at the boundary).
    Timestamp,
    /// Structured JSON document.
    Json,
    /// Fixed-dimension float vector (embeddings).
    Vector,
    /// Raw bytes.
    Blob,
}

impl FieldType {
    /// All field types, in matrix order.
    pub const ALL: [Self; 9] = [
        Self::Uuid,
        Self::Text,
        Self::Integer,
        Self::Float,
        Self::Boolean,
        Self::Timestamp,
        Self::Json,
        Self::Vector,
        Self::Blob,
    ];

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "UUID",
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::Json => "JSON",
            Self::Vector => "VECTOR",
            Self::Blob => "BLOB",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column default, rendered per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Integer literal.
    Integer(i64),
    /// Boolean literal.
    Bool(bool),
    /// Text literal.
    Text(&'static str),
    /// `{}`.
    EmptyObject,
    /// `[]`.
    EmptyArray,
    /// Insert time.
    CurrentTimestamp,
}

impl FieldDefault {
    /// The JSON value a record receives when the column is omitted.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(n) => Value::from(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::Text(s) => Value::String((*s).to_string()),
            Self::EmptyObject => Value::Object(serde_json::Map::new()),
            Self::EmptyArray => Value::Array(Vec::new()),
            Self::CurrentTimestamp => Value::String(crate::current_timestamp()),
        }
    }
}

/// One column of a logical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Column name.
    pub name: &'static str,
    /// Canonical type.
    pub field_type: FieldType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether this column is the primary key.
    pub primary_key: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Default applied on insert.
    pub default: Option<FieldDefault>,
    /// Maximum length for text columns.
    pub max_length: Option<u32>,
    /// Dimension count for vector columns.
    pub vector_dimensions: Option<u32>,
}

impl FieldDefinition {
    /// Creates a nullable column without constraints.
    #[must_use]
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
            max_length: None,
            vector_dimensions: None,
        }
    }

    /// Creates a vector column with the given dimensions.
    #[must_use]
    pub const fn vector(name: &'static str, dimensions: u32) -> Self {
        let mut field = Self::new(name, FieldType::Vector);
        field.vector_dimensions = Some(dimensions);
        field
    }

    /// Marks the column as primary key (implies NOT NULL).
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column UNIQUE.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the insert default.
    #[must_use]
    pub const fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the maximum text length.
    #[must_use]
    pub const fn max_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }
}

/// A secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name.
    pub name: &'static str,
    /// Indexed columns, in order.
    pub columns: &'static [&'static str],
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// One logical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDefinition {
    /// Logical table name.
    pub name: &'static str,
    /// Columns, in DDL order.
    pub fields: &'static [FieldDefinition],
    /// Secondary indexes.
    pub indexes: &'static [IndexDefinition],
}

impl TableDefinition {
    /// Looks up a column.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the primary-key column.
    ///
    /// Every table in this crate declares exactly one.
    #[must_use]
    pub fn primary_key(&self) -> &FieldDefinition {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .unwrap_or(&self.fields[0])
    }

    /// Returns true if the table has a column with the given name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterates column names in DDL order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Returns true if any column is a vector.
    #[must_use]
    pub fn has_vector_field(&self) -> bool {
        self.fields.iter().any(|f| f.field_type == FieldType::Vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_has_single_primary_key() {
        for table in storage_tables() {
            let pks = table.fields.iter().filter(|f| f.primary_key).count();
            assert_eq!(pks, 1, "table {} must have one primary key", table.name);
            assert!(!table.primary_key().nullable);
        }
    }

    #[test]
    fn test_canonical_tables_are_the_six_domain_tables() {
        let names: Vec<_> = canonical_tables().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["sources", "documents", "settings", "projects", "tasks", "code_examples"]
        );
    }

    #[test]
    fn test_vector_fields_declare_dimensions() {
        for table in storage_tables() {
            for field in table.fields {
                if field.field_type == FieldType::Vector {
                    assert!(field.vector_dimensions.is_some(), "{}.{}", table.name, field.name);
                }
            }
        }
    }

    #[test]
    fn test_index_columns_exist() {
        for table in storage_tables() {
            for index in table.indexes {
                for column in index.columns {
                    assert!(table.has_column(column), "{}.{}", table.name, column);
                }
            }
        }
    }

    #[test]
    fn test_defaults_to_value() {
        assert_eq!(FieldDefault::Bool(false).to_value(), Value::Bool(false));
        assert_eq!(FieldDefault::EmptyArray.to_value(), serde_json::json!([]));
        assert!(FieldDefault::CurrentTimestamp.to_value().is_string());
    }
}
