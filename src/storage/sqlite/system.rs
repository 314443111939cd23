use super::SqliteRepository;
use super::store;
use crate::Result;
use crate::models::{MigrationRecord, Record};
use crate::schema::tables;
use crate::storage::plan;
use crate::storage::record::{prepare_insert, required_str};
use crate::storage::rpc;
use crate::storage::traits::{
    MigrationRepository, PromptRepository, RpcRepository, SettingsRepository, TableCountRepository,
};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<Record>> {
        const OP: &str = "get_setting";
        let select = plan::by(&tables::SETTINGS, "key", key);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn get_all_settings(&self) -> Result<Vec<Record>> {
        const OP: &str = "get_all_settings";
        let select = plan::settings(None);
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }

    async fn get_settings_by_category(&self, category: &str) -> Result<Vec<Record>> {
        const OP: &str = "get_settings_by_category";
        let select = plan::settings(Some(category));
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }

    async fn upsert_setting(&self, setting: Record) -> Result<Record> {
        const OP: &str = "upsert_setting";
        let existing = plan::by(
            &tables::SETTINGS,
            "key",
            required_str(&setting, tables::SETTINGS.name, "key")?,
        );
        self.write(OP, move |c| store::upsert(c, existing, setting, OP))
            .await
    }

    async fn delete_setting(&self, key: &str) -> Result<bool> {
        const OP: &str = "delete_setting";
        let select = plan::by(&tables::SETTINGS, "key", key);
        self.read(OP, move |c| Ok(store::delete(c, &select, OP)? > 0))
            .await
    }
}

#[async_trait]
impl RpcRepository for SqliteRepository {
    async fn execute_rpc(&self, function_name: &str, params: Value) -> Result<Value> {
        rpc::execute_locally(self, function_name, &params).await
    }
}

#[async_trait]
impl PromptRepository for SqliteRepository {
    async fn get_prompt_by_name(&self, prompt_name: &str) -> Result<Option<Record>> {
        const OP: &str = "get_prompt_by_name";
        let select = plan::by(&tables::PROMPTS, "prompt_name", prompt_name);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn list_prompts(&self) -> Result<Vec<Record>> {
        const OP: &str = "list_prompts";
        let select = plan::prompts();
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }

    async fn upsert_prompt(&self, prompt: Record) -> Result<Record> {
        const OP: &str = "upsert_prompt";
        let existing = plan::by(
            &tables::PROMPTS,
            "prompt_name",
            required_str(&prompt, tables::PROMPTS.name, "prompt_name")?,
        );
        self.write(OP, move |c| store::upsert(c, existing, prompt, OP))
            .await
    }

    async fn delete_prompt(&self, prompt_name: &str) -> Result<bool> {
        const OP: &str = "delete_prompt";
        let select = plan::by(&tables::PROMPTS, "prompt_name", prompt_name);
        self.read(OP, move |c| Ok(store::delete(c, &select, OP)? > 0))
            .await
    }
}

#[async_trait]
impl TableCountRepository for SqliteRepository {
    async fn get_table_count(&self, table: &str, filters: &Record) -> Result<u64> {
        const OP: &str = "get_table_count";
        let select = plan::table_count(table, filters)?;
        self.read(OP, move |c| store::count(c, &select, OP)).await
    }
}

#[async_trait]
impl MigrationRepository for SqliteRepository {
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>> {
        const OP: &str = "get_applied_migrations";
        let select = plan::migrations();
        let rows = self.read(OP, move |c| store::select(c, &select, OP)).await?;
        rows.into_iter().map(MigrationRecord::from_record).collect()
    }

    async fn record_migration(&self, migration: MigrationRecord) -> Result<MigrationRecord> {
        const OP: &str = "record_migration";
        let row = prepare_insert(&tables::MIGRATIONS, migration.to_record())?;
        let row = self
            .read(OP, move |c| store::insert(c, &tables::MIGRATIONS, row, OP))
            .await?;
        MigrationRecord::from_record(row)
    }

    async fn is_migration_applied(&self, version: &str) -> Result<bool> {
        const OP: &str = "is_migration_applied";
        let select = plan::by(&tables::MIGRATIONS, "version", version);
        self.read(OP, move |c| Ok(store::first(c, select, OP)?.is_some()))
            .await
    }
}
