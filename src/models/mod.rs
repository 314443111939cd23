//! Data models exchanged across the repository boundary.
//!
//! Entities are plain attribute maps ([`Record`]); the typed structs here
//! describe query options and aggregate results that every backend produces
//! identically.

mod migration;
mod query;
mod record;
mod task;

pub use migration::MigrationRecord;
pub use query::{ListOptions, TaskFilter};
pub use record::{Record, record_from_json};
pub(crate) use record::json_type_name;
pub use task::{TaskStatus, TaskStatusCounts};
