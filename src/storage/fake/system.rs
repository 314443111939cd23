use super::FakeRepository;
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
impl SettingsRepository for FakeRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by(&tables::SETTINGS, "key", key))))
    }

    async fn get_all_settings(&self) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::settings(None))))
    }

    async fn get_settings_by_category(&self, category: &str) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::settings(Some(category)))))
    }

    async fn upsert_setting(&self, setting: Record) -> Result<Record> {
        let key = required_str(&setting, tables::SETTINGS.name, "key")?.to_string();
        self.with_state(|s| s.upsert(plan::by(&tables::SETTINGS, "key", &key), setting, "upsert_setting"))
    }

    async fn delete_setting(&self, key: &str) -> Result<bool> {
        self.with_state(|s| Ok(s.delete(&plan::by(&tables::SETTINGS, "key", key), "delete_setting")? > 0))
    }
}

#[async_trait]
impl RpcRepository for FakeRepository {
    async fn execute_rpc(&self, function_name: &str, params: Value) -> Result<Value> {
        rpc::execute_locally(self, function_name, &params).await
    }
}

#[async_trait]
impl PromptRepository for FakeRepository {
    async fn get_prompt_by_name(&self, prompt_name: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by(&tables::PROMPTS, "prompt_name", prompt_name))))
    }

    async fn list_prompts(&self) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::prompts())))
    }

    async fn upsert_prompt(&self, prompt: Record) -> Result<Record> {
        let name = required_str(&prompt, tables::PROMPTS.name, "prompt_name")?.to_string();
        self.with_state(|s| {
            s.upsert(plan::by(&tables::PROMPTS, "prompt_name", &name), prompt, "upsert_prompt")
        })
    }

    async fn delete_prompt(&self, prompt_name: &str) -> Result<bool> {
        self.with_state(|s| {
            Ok(s.delete(&plan::by(&tables::PROMPTS, "prompt_name", prompt_name), "delete_prompt")? > 0)
        })
    }
}

#[async_trait]
impl TableCountRepository for FakeRepository {
    async fn get_table_count(&self, table: &str, filters: &Record) -> Result<u64> {
        let select = plan::table_count(table, filters)?;
        self.with_state(|s| Ok(s.count(&select)))
    }
}

#[async_trait]
impl MigrationRepository for FakeRepository {
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>> {
        let rows = self.with_state(|s| Ok(s.select(&plan::migrations())))?;
        rows.into_iter().map(MigrationRecord::from_record).collect()
    }

    async fn record_migration(&self, migration: MigrationRecord) -> Result<MigrationRecord> {
        let row = prepare_insert(&tables::MIGRATIONS, migration.to_record())?;
        let row = self.with_state(|s| s.insert(&tables::MIGRATIONS, row, "record_migration"))?;
        MigrationRecord::from_record(row)
    }

    async fn is_migration_applied(&self, version: &str) -> Result<bool> {
        self.with_state(|s| Ok(s.first(plan::by(&tables::MIGRATIONS, "version", version)).is_some()))
    }
}
