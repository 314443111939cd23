//! Embedded `SQLite` repository.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition, pragmas, transactions, error translation
//! - [`codec`]: JSON values to and from `SQLite` storage classes
//! - [`sql`]: rendering of [`Select`](crate::storage::query::Select) plans
//! - [`migrations`]: bundled schema files and the checksum-verified runner
//! - `store`: row-level operations shared by every repository method
//!
//! ## Concurrency Model
//!
//! One `rusqlite::Connection` sits behind a mutex. Every repository call
//! moves its work onto `tokio::task::spawn_blocking`, takes the lock, and
//! runs to completion there; a caller dropping the future cannot interrupt
//! a transaction halfway. WAL mode and `busy_timeout` handle contention from
//! other processes sharing the file.
//!
//! Vector similarity is computed in the application over JSON-encoded
//! embeddings.

mod codec;
mod connection;
mod knowledge;
pub mod migrations;
mod projects;
mod sql;
mod store;
mod system;

pub use connection::{acquire_lock, configure_connection, open_connection, translate, with_transaction};
pub use migrations::{MigrationState, MigrationStatus};

use crate::config::{ChecksumPolicy, DEFAULT_BUSY_TIMEOUT_MS, SqliteConfig};
use crate::storage::metrics::observe;
use crate::storage::traits::DatabaseRepository;
use crate::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::instrument;

/// Backend name used in metrics and logs.
const BACKEND: &str = "sqlite";

/// `SQLite`-backed repository.
///
/// # Example
///
/// ```rust,ignore
/// use archon_dal::storage::SqliteRepository;
///
/// let repo = SqliteRepository::in_memory()?;
/// let project = repo.create_project(record).await?;
/// ```
pub struct SqliteRepository {
    /// Connection to the `SQLite` database.
    conn: Arc<Mutex<Connection>>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteRepository {
    /// Opens (or creates) the database file and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] if the file cannot be opened as a
    /// database, or a migration error.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let mut conn = open_connection(&config.path)?;
        configure_connection(&conn, config.busy_timeout_ms)?;
        migrations::apply_migrations(&mut conn, config.checksum_policy)?;
        tracing::info!(path = %config.path.display(), "Opened SQLite repository");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(config.path.clone()),
        })
    }

    /// Opens the database file at `path` with default settings.
    ///
    /// # Errors
    ///
    /// See [`SqliteRepository::open`].
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(&SqliteConfig {
            path: path.into(),
            ..SqliteConfig::default()
        })
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|e| Error::ConnectionFailed {
            operation: "open_sqlite_memory".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn, DEFAULT_BUSY_TIMEOUT_MS)?;
        migrations::apply_migrations(&mut conn, ChecksumPolicy::Warn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: None,
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Reports the state of each bundled migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookkeeping table cannot be read.
    pub async fn migration_status(&self) -> Result<Vec<MigrationStatus>> {
        self.read("migration_status", migrations::migration_status)
            .await
    }

    /// Runs `f` against the connection on the blocking pool.
    #[instrument(skip(self, f), fields(backend = BACKEND))]
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let start = Instant::now();
        let conn = Arc::clone(&self.conn);
        let result = match tokio::task::spawn_blocking(move || {
            let mut guard = acquire_lock(&conn);
            f(&mut guard)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("blocking task failed: {e}"),
            }),
        };
        observe(BACKEND, operation, start, &result);
        result
    }

    /// Runs a read (or single-statement write).
    async fn read<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        self.with_conn(operation, move |conn| f(conn)).await
    }

    /// Runs a multi-statement write inside one transaction.
    async fn write<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        self.with_conn(operation, move |conn| with_transaction(conn, operation, f))
            .await
    }
}

impl DatabaseRepository for SqliteRepository {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
