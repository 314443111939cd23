//! Migration bookkeeping rows.

use super::Record;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One applied migration, as stored in the `migrations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Row identifier.
    pub id: String,
    /// Ordering key, e.g. `"001"`.
    pub version: String,
    /// File stem, e.g. `"001_initial_schema"`.
    pub migration_name: String,
    /// Hex SHA-256 of the migration file contents.
    pub checksum: String,
    /// RFC 3339 application time.
    pub applied_at: String,
    /// Who applied it (`"archon-dal"` for the bundled runner).
    pub applied_by: String,
}

impl MigrationRecord {
    /// Creates a record stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        migration_name: impl Into<String>,
        checksum: impl Into<String>,
        applied_by: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            version: version.into(),
            migration_name: migration_name.into(),
            checksum: checksum.into(),
            applied_at: crate::current_timestamp(),
            applied_by: applied_by.into(),
        }
    }

    /// Converts the record into a `migrations` row.
    #[must_use]
    pub fn to_record(&self) -> Record {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Record::new(),
        }
    }

    /// Reads a `migrations` row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if a column is missing or mistyped.
    pub fn from_record(row: Record) -> Result<Self> {
        serde_json::from_value(Value::Object(row))
            .map_err(|e| Error::operation("read_migration_record", e))
    }
}
