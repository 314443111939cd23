//! # archon-dal
//!
//! Database abstraction layer for the Archon knowledge base.
//!
//! Application services depend on a single asynchronous contract,
//! [`DatabaseRepository`], covering projects, tasks, settings, crawled
//! knowledge (sources, pages, document chunks, code examples), document
//! versions, prompts and migration bookkeeping. Three implementations ship
//! with the crate:
//!
//! - [`SupabaseRepository`]: PostgREST over HTTP, native `UUID`/`JSONB`/`VECTOR`
//!   columns and server-side search functions
//! - [`SqliteRepository`]: embedded file database with bundled migrations and
//!   application-side similarity search
//! - [`FakeRepository`]: in-memory double that enforces the same invariants
//!
//! A diagnostic path ([`DatabaseSchemaValidator`], [`DatabaseConfigValidator`])
//! checks schema compatibility and environment configuration for every
//! supported database without opening a connection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use archon_dal::{DalConfig, RepositoryFactory};
//!
//! let config = DalConfig::load()?;
//! let repository = RepositoryFactory::create(&config).await?;
//! let source = repository.get_source_by_id("docs.rs").await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod schema;
pub mod services;
pub mod storage;
pub mod validation;

pub use config::{DalConfig, RepositoryKind};
pub use models::{ListOptions, MigrationRecord, Record, TaskFilter, TaskStatusCounts};
pub use schema::{DatabaseType, FieldType};
pub use services::{DependencyContainer, RepositoryFactory};
pub use storage::{DatabaseRepository, FakeRepository, SqliteRepository, SupabaseRepository};
pub use validation::{DatabaseConfigValidator, DatabaseSchemaValidator};

/// Error type for repository and configuration operations.
///
/// Every backend translates its native failures into these variants at the
/// boundary, so callers can branch on [`Error::kind`] without knowing which
/// backend is active.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown table names, malformed records, bad RPC parameters |
/// | `NotFound` | A referenced configuration file or migration directory is missing |
/// | `ConnectionFailed` | Database file cannot be opened, HTTP connect/auth failures |
/// | `ConstraintViolation` | Duplicate primary keys, unique-key conflicts |
/// | `Timeout` | Lock or request deadlines exceeded |
/// | `Unsupported` | RPC functions without a local equivalent |
/// | `OperationFailed` | Any other backend fault |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required resource outside the data itself does not exist.
    ///
    /// Absent rows are reported as `Ok(None)`, never with this variant.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or rejected the credentials.
    #[error("connection failed during '{operation}': {cause}")]
    ConnectionFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A uniqueness or integrity constraint rejected the write.
    #[error("constraint violation during '{operation}': {cause}")]
    ConstraintViolation {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The backend did not answer in time.
    #[error("operation '{operation}' timed out: {cause}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The backend has no implementation for the requested capability.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Backend-independent classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::InvalidInput`].
    InvalidInput,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::ConnectionFailed`].
    ConnectionFailed,
    /// See [`Error::ConstraintViolation`].
    ConstraintViolation,
    /// See [`Error::Timeout`].
    Timeout,
    /// See [`Error::Unsupported`].
    Unsupported,
    /// See [`Error::OperationFailed`].
    Backend,
}

impl Error {
    /// Returns the backend-independent kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::OperationFailed { .. } => ErrorKind::Backend,
        }
    }

    /// Shorthand for [`Error::OperationFailed`].
    pub fn operation(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current UTC time as an RFC 3339 string.
///
/// Every backend stamps `created_at`/`updated_at` through this function so the
/// textual format is identical whether the value ends up in `TIMESTAMPTZ`,
/// SQLite `TEXT` or an in-memory map.
#[must_use]
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
