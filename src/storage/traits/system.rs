//! Settings, prompts and infrastructure operation groups.

use crate::Result;
use crate::models::{MigrationRecord, Record};
use async_trait::async_trait;
use serde_json::Value;

/// Application settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetches a setting by key.
    async fn get_setting(&self, key: &str) -> Result<Option<Record>>;

    /// Lists every setting, ordered by key.
    async fn get_all_settings(&self) -> Result<Vec<Record>>;

    /// Lists the settings of a category, ordered by key.
    async fn get_settings_by_category(&self, category: &str) -> Result<Vec<Record>>;

    /// Inserts or merges a setting keyed by `key`.
    async fn upsert_setting(&self, setting: Record) -> Result<Record>;

    /// Deletes a setting. Returns `true` iff it existed.
    async fn delete_setting(&self, key: &str) -> Result<bool>;
}

/// Named server-side functions.
#[async_trait]
pub trait RpcRepository: Send + Sync {
    /// Invokes a search function by name.
    ///
    /// `match_documents`, `match_code_examples` and `hybrid_search` behave
    /// identically on every backend. Other names are forwarded where the
    /// backend has stored procedures and fail with
    /// [`Error::Unsupported`](crate::Error::Unsupported) elsewhere.
    async fn execute_rpc(&self, function_name: &str, params: Value) -> Result<Value>;
}

/// Prompt templates.
#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// Fetches a prompt.
    async fn get_prompt_by_name(&self, prompt_name: &str) -> Result<Option<Record>>;

    /// Lists prompts by name.
    async fn list_prompts(&self) -> Result<Vec<Record>>;

    /// Inserts or merges a prompt keyed by `prompt_name`.
    async fn upsert_prompt(&self, prompt: Record) -> Result<Record>;

    /// Deletes a prompt.
    async fn delete_prompt(&self, prompt_name: &str) -> Result<bool>;
}

/// Row counts of logical tables.
#[async_trait]
pub trait TableCountRepository: Send + Sync {
    /// Counts rows of `table` whose columns equal the given values.
    ///
    /// Unknown tables or columns fail with
    /// [`Error::InvalidInput`](crate::Error::InvalidInput).
    async fn get_table_count(&self, table: &str, filters: &Record) -> Result<u64>;
}

/// Schema migration bookkeeping.
#[async_trait]
pub trait MigrationRepository: Send + Sync {
    /// Lists applied migrations by version.
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Records an applied migration.
    async fn record_migration(&self, migration: MigrationRecord) -> Result<MigrationRecord>;

    /// Returns true if `version` has been applied.
    async fn is_migration_applied(&self, version: &str) -> Result<bool>;
}
