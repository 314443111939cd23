//! Canonical type to native type matrix.

use super::{FieldDefinition, FieldType};
use serde::Serialize;

/// Databases the schema can be validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Hosted PostgreSQL with pgvector and PostgREST.
    Supabase,
    /// Self-managed PostgreSQL.
    Postgresql,
    /// MySQL 8.
    Mysql,
    /// Embedded SQLite.
    Sqlite,
}

impl DatabaseType {
    /// All database types, in report order.
    pub const ALL: [Self; 4] = [Self::Supabase, Self::Postgresql, Self::Mysql, Self::Sqlite];

    /// Returns the lowercase identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Supabase => "supabase",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses an identifier, case-insensitively.
    ///
    /// `postgres` is accepted as an alias of `postgresql`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Some(Self::Supabase),
            "postgresql" | "postgres" => Some(Self::Postgresql),
            "mysql" => Some(Self::Mysql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns true for PostgreSQL-compatible targets.
    #[must_use]
    pub const fn is_postgres_family(&self) -> bool {
        matches!(self, Self::Supabase | Self::Postgresql)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one canonical type is stored on one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeMapping {
    /// Whether the database has a native equivalent.
    pub supported: bool,
    /// Native column type (fallback representation when unsupported).
    pub native_type: &'static str,
    /// Caveats of the native representation.
    pub limitations: &'static [&'static str],
    /// Whether an unsupported type has a usable fallback.
    pub fallback: bool,
}

impl TypeMapping {
    const fn native(native_type: &'static str) -> Self {
        Self {
            supported: true,
            native_type,
            limitations: &[],
            fallback: false,
        }
    }

    const fn limited(native_type: &'static str, limitations: &'static [&'static str]) -> Self {
        Self {
            supported: true,
            native_type,
            limitations,
            fallback: false,
        }
    }

    const fn fallback(native_type: &'static str, limitations: &'static [&'static str]) -> Self {
        Self {
            supported: false,
            native_type,
            limitations,
            fallback: true,
        }
    }

    /// Renders the column type for a specific field.
    ///
    /// Native vectors carry their dimension count; bounded text becomes
    /// `VARCHAR(n)` where the database distinguishes it.
    #[must_use]
    pub fn render(&self, field: &FieldDefinition, database: DatabaseType) -> String {
        match field.field_type {
            FieldType::Vector if self.supported => {
                format!("VECTOR({})", field.vector_dimensions.unwrap_or_default())
            },
            FieldType::Text if database != DatabaseType::Sqlite => field
                .max_length
                .map_or_else(|| self.native_type.to_string(), |n| format!("VARCHAR({n})")),
            _ => self.native_type.to_string(),
        }
    }
}

/// Returns the mapping of `field_type` on `database`.
#[must_use]
pub const fn type_mapping(field_type: FieldType, database: DatabaseType) -> TypeMapping {
    use DatabaseType::{Mysql, Postgresql, Sqlite, Supabase};

    match (field_type, database) {
        (FieldType::Uuid, Supabase | Postgresql) => TypeMapping::native("UUID"),
        (FieldType::Uuid, Mysql) => {
            TypeMapping::limited("CHAR(36)", &["UUIDs are stored as 36-character strings"])
        },
        (FieldType::Uuid, Sqlite) => {
            TypeMapping::limited("TEXT", &["UUIDs are stored as text without format checks"])
        },

        (FieldType::Text, Supabase | Postgresql | Sqlite) => TypeMapping::native("TEXT"),
        (FieldType::Text, Mysql) => TypeMapping::native("LONGTEXT"),

        (FieldType::Integer, Supabase | Postgresql | Sqlite) => TypeMapping::native("INTEGER"),
        (FieldType::Integer, Mysql) => TypeMapping::native("INT"),

        (FieldType::Float, Supabase | Postgresql) => TypeMapping::native("DOUBLE PRECISION"),
        (FieldType::Float, Mysql) => TypeMapping::native("DOUBLE"),
        (FieldType::Float, Sqlite) => TypeMapping::native("REAL"),

        (FieldType::Boolean, Supabase | Postgresql) => TypeMapping::native("BOOLEAN"),
        (FieldType::Boolean, Mysql) => TypeMapping::native("TINYINT(1)"),
        (FieldType::Boolean, Sqlite) => {
            TypeMapping::limited("INTEGER", &["booleans are stored as 0/1 integers"])
        },

        (FieldType::Timestamp, Supabase | Postgresql) => TypeMapping::native("TIMESTAMPTZ"),
        (FieldType::Timestamp, Mysql) => {
            TypeMapping::limited("DATETIME(6)", &["no time zone; values are stored as UTC"])
        },
        (FieldType::Timestamp, Sqlite) => {
            TypeMapping::limited("TEXT", &["timestamps are stored as RFC 3339 text"])
        },

        (FieldType::Json, Supabase | Postgresql) => TypeMapping::native("JSONB"),
        (FieldType::Json, Mysql) => TypeMapping::limited(
            "JSON",
            &["no containment operator index; use generated columns for hot paths"],
        ),
        (FieldType::Json, Sqlite) => TypeMapping::limited(
            "TEXT",
            &["JSON is stored as text; containment filters run in the application"],
        ),

        (FieldType::Vector, Supabase) => TypeMapping::native("VECTOR"),
        (FieldType::Vector, Postgresql) => {
            TypeMapping::limited("VECTOR", &["requires the pgvector extension"])
        },
        (FieldType::Vector, Mysql) => TypeMapping::fallback(
            "JSON",
            &["no native vector type; similarity search runs in the application"],
        ),
        (FieldType::Vector, Sqlite) => TypeMapping::fallback(
            "TEXT",
            &["no native vector type; embeddings are JSON text and similarity search runs in the application"],
        ),

        (FieldType::Blob, Supabase | Postgresql) => TypeMapping::native("BYTEA"),
        (FieldType::Blob, Mysql) => TypeMapping::native("LONGBLOB"),
        (FieldType::Blob, Sqlite) => TypeMapping::native("BLOB"),
    }
}
