//! Offline diagnostics.
//!
//! Neither validator opens a connection: schema checks work from the
//! canonical table definitions and type mappings, configuration checks from
//! environment values.

mod config;
mod schema;

pub use config::{
    ConfigRule, ConfigValidationResult, DatabaseConfigValidation, DatabaseConfigValidator,
    FAKE_DATABASE, Severity, rules_for,
};
pub use schema::{DatabaseSchemaValidator, ValidationResult};
