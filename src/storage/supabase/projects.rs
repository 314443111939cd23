use super::SupabaseRepository;
use crate::Result;
use crate::models::{Record, TaskFilter, TaskStatusCounts};
use crate::schema::tables;
use crate::storage::plan::{
    self, PROJECT_CASCADE, PROJECT_CONTENT_COLUMNS, TASK_LARGE_COLUMNS, archive_updates,
    count_by_project, features_of, link_record, unpinned,
};
use crate::storage::record::{prepare_insert, prepare_update, str_field, strip};
use crate::storage::traits::{
    DocumentVersionRepository, ProjectRepository, ProjectSourceRepository, TaskRepository,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

#[async_trait]
impl ProjectRepository for SupabaseRepository {
    async fn create_project(&self, project: Record) -> Result<Record> {
        const OP: &str = "create_project";
        let row = prepare_insert(&tables::PROJECTS, project)?;
        self.call(OP, self.rest.insert(&tables::PROJECTS, row, OP)).await
    }

    async fn get_project_by_id(&self, project_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_project_by_id";
        let select = plan::by_key(&tables::PROJECTS, project_id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn list_projects(&self, include_content: bool) -> Result<Vec<Record>> {
        const OP: &str = "list_projects";
        let select = plan::projects();
        let mut rows = self.call(OP, self.rest.select(&select, OP)).await?;
        if !include_content {
            for row in &mut rows {
                strip(row, PROJECT_CONTENT_COLUMNS);
            }
        }
        Ok(rows)
    }

    async fn update_project(&self, project_id: &str, updates: Record) -> Result<Option<Record>> {
        const OP: &str = "update_project";
        self.call(OP, self.rest.update(&tables::PROJECTS, project_id, updates, OP))
            .await
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        const OP: &str = "delete_project";
        self.call(
            OP,
            self.rest.cascade(&PROJECT_CASCADE, &tables::PROJECTS, project_id, OP),
        )
        .await
    }

    async fn unpin_all_projects_except(&self, project_id: &str) -> Result<u64> {
        const OP: &str = "unpin_all_projects_except";
        let select = plan::pinned_projects_except(project_id);
        self.call(OP, async {
            let mut changed = 0;
            for existing in self.rest.select(&select, OP).await? {
                let row = prepare_update(&tables::PROJECTS, &existing, unpinned())?;
                self.rest.replace(&tables::PROJECTS, row, OP).await?;
                changed += 1;
            }
            Ok(changed)
        })
        .await
    }

    async fn get_project_features(&self, project_id: &str) -> Result<Option<Vec<Value>>> {
        let project = self.get_project_by_id(project_id).await?;
        Ok(project.map(|p| features_of(&p)))
    }
}

#[async_trait]
impl TaskRepository for SupabaseRepository {
    async fn create_task(&self, task: Record) -> Result<Record> {
        const OP: &str = "create_task";
        let row = prepare_insert(&tables::TASKS, task)?;
        self.call(OP, self.rest.insert(&tables::TASKS, row, OP)).await
    }

    async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_task_by_id";
        let select = plan::by_key(&tables::TASKS, task_id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Record>> {
        const OP: &str = "list_tasks";
        let select = plan::tasks(filter);
        let mut rows = self.call(OP, self.rest.select(&select, OP)).await?;
        if filter.exclude_large_fields {
            for row in &mut rows {
                strip(row, TASK_LARGE_COLUMNS);
            }
        }
        Ok(rows)
    }

    async fn update_task(&self, task_id: &str, updates: Record) -> Result<Option<Record>> {
        const OP: &str = "update_task";
        self.call(OP, self.rest.update(&tables::TASKS, task_id, updates, OP))
            .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<bool> {
        const OP: &str = "delete_task";
        let select = plan::by_key(&tables::TASKS, task_id);
        Ok(self.call(OP, self.rest.delete(&select, OP)).await? > 0)
    }

    async fn archive_task(&self, task_id: &str, archived_by: &str) -> Result<Option<Record>> {
        const OP: &str = "archive_task";
        let updates = archive_updates(archived_by);
        self.call(OP, self.rest.update(&tables::TASKS, task_id, updates, OP))
            .await
    }

    async fn get_tasks_by_project_and_status(&self, project_id: &str, status: &str) -> Result<Vec<Record>> {
        self.list_tasks(&TaskFilter::new().with_project(project_id).with_status(status))
            .await
    }

    async fn get_task_counts_by_project(&self, project_id: &str) -> Result<TaskStatusCounts> {
        let rows = self.list_tasks(&TaskFilter::new().with_project(project_id)).await?;
        let mut counts = TaskStatusCounts::default();
        for row in &rows {
            counts.record(str_field(row, "status"));
        }
        Ok(counts)
    }

    async fn get_all_project_task_counts(&self) -> Result<BTreeMap<String, TaskStatusCounts>> {
        const OP: &str = "get_all_project_task_counts";
        let select = plan::active_project_tasks();
        let rows = self.call(OP, self.rest.select(&select, OP)).await?;
        Ok(count_by_project(&rows))
    }
}

#[async_trait]
impl DocumentVersionRepository for SupabaseRepository {
    async fn create_document_version(&self, version: Record) -> Result<Record> {
        const OP: &str = "create_document_version";
        self.call(OP, async {
            let mut version = version;
            if version.get("version_number").is_none_or(Value::is_null) {
                let latest = self
                    .rest
                    .first(
                        plan::document_versions(
                            str_field(&version, "project_id"),
                            str_field(&version, "field_name"),
                        ),
                        OP,
                    )
                    .await?;
                version.insert(
                    "version_number".to_string(),
                    Value::from(plan::next_version_number(latest.as_ref())),
                );
            }
            let row = prepare_insert(&tables::DOCUMENT_VERSIONS, version)?;
            self.rest.insert(&tables::DOCUMENT_VERSIONS, row, OP).await
        })
        .await
    }

    async fn list_document_versions(&self, project_id: &str, field_name: Option<&str>) -> Result<Vec<Record>> {
        const OP: &str = "list_document_versions";
        let select = plan::document_versions(Some(project_id), field_name);
        self.call(OP, self.rest.select(&select, OP)).await
    }

    async fn get_document_version_by_id(&self, version_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_document_version_by_id";
        let select = plan::by_key(&tables::DOCUMENT_VERSIONS, version_id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn get_latest_document_version(&self, project_id: &str, field_name: &str) -> Result<Option<Record>> {
        const OP: &str = "get_latest_document_version";
        let select = plan::document_versions(Some(project_id), Some(field_name));
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn delete_document_version(&self, version_id: &str) -> Result<bool> {
        const OP: &str = "delete_document_version";
        let select = plan::by_key(&tables::DOCUMENT_VERSIONS, version_id);
        Ok(self.call(OP, self.rest.delete(&select, OP)).await? > 0)
    }
}

#[async_trait]
impl ProjectSourceRepository for SupabaseRepository {
    async fn link_project_source(
        &self,
        project_id: &str,
        source_id: &str,
        notes: Option<&str>,
        created_by: &str,
    ) -> Result<Record> {
        const OP: &str = "link_project_source";
        let existing = plan::project_source(project_id, source_id);
        let row = prepare_insert(
            &tables::PROJECT_SOURCES,
            link_record(project_id, source_id, notes, created_by),
        )?;
        self.call(OP, async {
            if let Some(link) = self.rest.first(existing, OP).await? {
                return Ok(link);
            }
            self.rest.insert(&tables::PROJECT_SOURCES, row, OP).await
        })
        .await
    }

    async fn unlink_project_source(&self, project_id: &str, source_id: &str) -> Result<bool> {
        const OP: &str = "unlink_project_source";
        let select = plan::project_source(project_id, source_id);
        Ok(self.call(OP, self.rest.delete(&select, OP)).await? > 0)
    }

    async fn list_project_sources(&self, project_id: &str) -> Result<Vec<Record>> {
        const OP: &str = "list_project_sources";
        let select = plan::project_sources_by("project_id", project_id);
        self.call(OP, self.rest.select(&select, OP)).await
    }

    async fn list_projects_for_source(&self, source_id: &str) -> Result<Vec<Record>> {
        const OP: &str = "list_projects_for_source";
        let select = plan::project_sources_by("source_id", source_id);
        self.call(OP, self.rest.select(&select, OP)).await
    }
}
