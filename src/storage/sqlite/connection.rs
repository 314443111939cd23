//! Shared connection handling for the `SQLite` backend.
//!
//! Provides mutex poison recovery, connection opening, pragma configuration
//! and translation of `rusqlite` failures into [`Error`] variants.

use crate::{Error, Result};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning. This prevents cascading
/// failures when one operation panics.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Mutex;
/// use archon_dal::storage::sqlite::acquire_lock;
///
/// let mutex = Mutex::new(connection);
/// let guard = acquire_lock(&mutex);
/// ```
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            // A rolled-back transaction leaves the connection usable.
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Opens a database file, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::ConnectionFailed`] if the directory cannot be created or
/// the file cannot be opened as a database.
pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::ConnectionFailed {
            operation: "open_sqlite".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }
    Connection::open(path).map_err(|e| Error::ConnectionFailed {
        operation: "open_sqlite".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

/// Configures a `SQLite` connection for concurrent use.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits for locks instead of failing with `SQLITE_BUSY`
/// - **`foreign_keys`**: off; cascades are explicit
///
/// # Errors
///
/// Returns [`Error::ConnectionFailed`] if the file is not a database.
pub fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> Result<()> {
    // journal_mode returns a row, so it cannot go through execute_batch.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", busy_timeout_ms.to_string());

    // Touch the schema so a corrupt or foreign file fails here, not mid-query.
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| Error::ConnectionFailed {
        operation: "configure_sqlite".to_string(),
        cause: e.to_string(),
    })?;
    Ok(())
}

/// Runs `f` inside a `BEGIN IMMEDIATE` transaction.
///
/// Commits on `Ok`; the transaction rolls back when dropped on `Err`.
///
/// # Errors
///
/// Propagates `f`'s error, or a translated begin/commit failure.
pub fn with_transaction<T>(
    conn: &mut Connection,
    operation: &str,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| translate(operation, &e))?;
    let value = f(&tx)?;
    tx.commit().map_err(|e| translate(operation, &e))?;
    Ok(value)
}

/// Translates a `rusqlite` error into the crate taxonomy.
pub fn translate(operation: &str, err: &rusqlite::Error) -> Error {
    let operation = operation.to_string();
    let cause = err.to_string();
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Error::ConstraintViolation { operation, cause },
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            Error::Timeout { operation, cause }
        },
        Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied) => {
            Error::ConnectionFailed { operation, cause }
        },
        _ => Error::OperationFailed { operation, cause },
    }
}
