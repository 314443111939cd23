//! Bundled schema migrations for the `SQLite` backend.
//!
//! Migration files are embedded at compile time and applied in version
//! order when a database is opened. Each file runs in its own transaction
//! together with its bookkeeping row in `migrations`, so a failing file
//! leaves no partial schema behind.
//!
//! Applied files are identified by version and verified by SHA-256 checksum.
//! A file whose contents changed after it was applied ("drift") is never
//! re-applied; [`ChecksumPolicy`] decides whether drift is ignored, logged or
//! fatal.

use super::connection::{translate, with_transaction};
use super::sql::insert_sql;
use crate::config::ChecksumPolicy;
use crate::models::MigrationRecord;
use crate::schema::{TableDefinition, tables};
use crate::storage::record::prepare_insert;
use crate::{Error, Result};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Recorded as `applied_by` for bundled migrations.
pub const APPLIED_BY: &str = "archon-dal";

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Ordering key, e.g. `"001"`.
    pub version: &'static str,
    /// File stem, e.g. `"001_initial_schema"`.
    pub name: &'static str,
    /// SQL to apply (may contain multiple statements).
    pub sql: &'static str,
}

impl Migration {
    /// Hex SHA-256 of the SQL text.
    #[must_use]
    pub fn checksum(&self) -> String {
        checksum(self.sql)
    }
}

/// Migrations shipped with the crate, in version order.
pub const BUNDLED: &[Migration] = &[
    Migration {
        version: "001",
        name: "001_initial_schema",
        sql: include_str!("../../../migrations/sqlite/001_initial_schema.sql"),
    },
    Migration {
        version: "002",
        name: "002_indexes",
        sql: include_str!("../../../migrations/sqlite/002_indexes.sql"),
    },
];

/// Bookkeeping table, created before any migration runs.
const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id TEXT PRIMARY KEY,
    version TEXT NOT NULL UNIQUE,
    migration_name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    applied_by TEXT NOT NULL DEFAULT 'system'
)";

/// State of one bundled migration in a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Applied with a matching checksum.
    Applied,
    /// Not yet applied.
    Pending,
    /// Applied, but the bundled file has changed since.
    Drifted,
}

impl MigrationState {
    /// Returns a lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Pending => "pending",
            Self::Drifted => "drifted",
        }
    }
}

/// Status line for one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Version.
    pub version: &'static str,
    /// File stem.
    pub name: &'static str,
    /// Current state.
    pub state: MigrationState,
}

/// Hex SHA-256 of `sql`.
#[must_use]
pub fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Splits a script into statements on `;`, ignoring semicolons inside
/// quoted strings, quoted identifiers and comments.
///
/// Comment-only fragments are dropped.
#[must_use]
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                has_code = true;
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == c {
                        // A doubled quote is an escaped quote.
                        if chars.peek() == Some(&c) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        } else {
                            break;
                        }
                    }
                }
            },
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            },
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                current.push(' ');
            },
            ';' => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
            },
            _ => {
                if !c.is_whitespace() {
                    has_code = true;
                }
                current.push(c);
            },
        }
    }
    if has_code {
        statements.push(current.trim().to_string());
    }
    statements
}

/// Applies every pending bundled migration.
///
/// Returns the versions applied by this call.
///
/// # Errors
///
/// Returns an error if a migration fails (its transaction is rolled back) or
/// if drift is found under [`ChecksumPolicy::Reject`].
pub fn apply_migrations(conn: &mut Connection, policy: ChecksumPolicy) -> Result<Vec<&'static str>> {
    apply(conn, BUNDLED, policy)
}

/// Applies `migrations` in order.
///
/// # Errors
///
/// See [`apply_migrations`].
pub fn apply(
    conn: &mut Connection,
    migrations: &[Migration],
    policy: ChecksumPolicy,
) -> Result<Vec<&'static str>> {
    conn.execute_batch(MIGRATIONS_TABLE)
        .map_err(|e| translate("create_migrations_table", &e))?;
    let applied = applied_checksums(conn)?;
    let mut newly_applied = Vec::new();

    for migration in migrations {
        let checksum = migration.checksum();
        match applied.get(migration.version) {
            Some(recorded) if *recorded == checksum => {},
            Some(recorded) => handle_drift(migration, recorded, &checksum, policy)?,
            None => {
                apply_one(conn, migration, checksum)?;
                newly_applied.push(migration.version);
            },
        }
    }

    if !newly_applied.is_empty() {
        tracing::info!(versions = ?newly_applied, "Applied SQLite migrations");
    }
    Ok(newly_applied)
}

/// Reports the state of each bundled migration without changing anything.
///
/// # Errors
///
/// Returns an error if the bookkeeping table cannot be read.
pub fn migration_status(conn: &Connection) -> Result<Vec<MigrationStatus>> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'migrations')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| translate("migration_status", &e))?;
    let applied = if exists {
        applied_checksums(conn)?
    } else {
        HashMap::new()
    };

    Ok(BUNDLED
        .iter()
        .map(|m| MigrationStatus {
            version: m.version,
            name: m.name,
            state: match applied.get(m.version) {
                None => MigrationState::Pending,
                Some(recorded) if *recorded == m.checksum() => MigrationState::Applied,
                Some(_) => MigrationState::Drifted,
            },
        })
        .collect())
}

fn applied_checksums(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT version, checksum FROM migrations")
        .map_err(|e| translate("read_migrations", &e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| translate("read_migrations", &e))?;
    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| translate("read_migrations", &e))
}

fn handle_drift(
    migration: &Migration,
    recorded: &str,
    current: &str,
    policy: ChecksumPolicy,
) -> Result<()> {
    match policy {
        ChecksumPolicy::Ignore => {
            tracing::debug!(version = migration.version, "Ignoring migration checksum drift");
            Ok(())
        },
        ChecksumPolicy::Warn => {
            tracing::warn!(
                version = migration.version,
                name = migration.name,
                recorded,
                current,
                "Applied migration changed since it was recorded"
            );
            metrics::counter!("sqlite_migration_drift_total").increment(1);
            Ok(())
        },
        ChecksumPolicy::Reject => Err(Error::OperationFailed {
            operation: "apply_migrations".to_string(),
            cause: format!(
                "migration {} changed since it was applied (recorded {recorded}, bundled {current})",
                migration.name
            ),
        }),
    }
}

fn apply_one(conn: &mut Connection, migration: &Migration, checksum: String) -> Result<()> {
    let operation = format!("apply_migration_{}", migration.version);
    with_transaction(conn, &operation, |tx| {
        for statement in split_statements(migration.sql) {
            tx.execute_batch(&statement).map_err(|e| Error::OperationFailed {
                operation: operation.clone(),
                cause: format!("{}: {e}", migration.name),
            })?;
        }
        let record = MigrationRecord::new(migration.version, migration.name, checksum, APPLIED_BY);
        let row = prepare_insert(&tables::MIGRATIONS, record.to_record())?;
        let stmt = insert_sql(&tables::MIGRATIONS, &row)?;
        tx.execute(&stmt.sql, stmt.param_refs().as_slice())
            .map_err(|e| translate(&operation, &e))?;
        Ok(())
    })
    .inspect_err(|e| tracing::error!(version = migration.version, error = %e, "Migration failed"))
}

/// Returns true if `table` exists with every column the contract expects.
///
/// # Errors
///
/// Returns an error if the schema cannot be inspected.
pub fn table_matches_definition(conn: &Connection, table: &TableDefinition) -> Result<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", super::sql::quote(table.name)))
        .map_err(|e| translate("table_info", &e))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| translate("table_info", &e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| translate("table_info", &e))?;
    Ok(table
        .fields
        .iter()
        .all(|f| columns.iter().any(|c| c == f.name)))
}
