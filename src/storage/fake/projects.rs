use super::FakeRepository;
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
impl ProjectRepository for FakeRepository {
    async fn create_project(&self, project: Record) -> Result<Record> {
        let row = prepare_insert(&tables::PROJECTS, project)?;
        self.with_state(|s| s.insert(&tables::PROJECTS, row, "create_project"))
    }

    async fn get_project_by_id(&self, project_id: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by_key(&tables::PROJECTS, project_id))))
    }

    async fn list_projects(&self, include_content: bool) -> Result<Vec<Record>> {
        let mut rows = self.with_state(|s| Ok(s.select(&plan::projects())))?;
        if !include_content {
            for row in &mut rows {
                strip(row, PROJECT_CONTENT_COLUMNS);
            }
        }
        Ok(rows)
    }

    async fn update_project(&self, project_id: &str, updates: Record) -> Result<Option<Record>> {
        self.with_state(|s| s.update(&tables::PROJECTS, project_id, updates, "update_project"))
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        self.with_state(|s| s.cascade(&PROJECT_CASCADE, &tables::PROJECTS, project_id, "delete_project"))
    }

    async fn unpin_all_projects_except(&self, project_id: &str) -> Result<u64> {
        const OP: &str = "unpin_all_projects_except";
        self.with_state(|s| {
            s.transaction(|s| {
                let pinned = s.select(&plan::pinned_projects_except(project_id));
                let mut changed = 0;
                for existing in pinned {
                    let row = prepare_update(&tables::PROJECTS, &existing, unpinned())?;
                    s.replace(&tables::PROJECTS, row, OP)?;
                    changed += 1;
                }
                Ok(changed)
            })
        })
    }

    async fn get_project_features(&self, project_id: &str) -> Result<Option<Vec<Value>>> {
        let project = self.get_project_by_id(project_id).await?;
        Ok(project.map(|p| features_of(&p)))
    }
}

#[async_trait]
impl TaskRepository for FakeRepository {
    async fn create_task(&self, task: Record) -> Result<Record> {
        let row = prepare_insert(&tables::TASKS, task)?;
        self.with_state(|s| s.insert(&tables::TASKS, row, "create_task"))
    }

    async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by_key(&tables::TASKS, task_id))))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Record>> {
        let mut rows = self.with_state(|s| Ok(s.select(&plan::tasks(filter))))?;
        if filter.exclude_large_fields {
            for row in &mut rows {
                strip(row, TASK_LARGE_COLUMNS);
            }
        }
        Ok(rows)
    }

    async fn update_task(&self, task_id: &str, updates: Record) -> Result<Option<Record>> {
        self.with_state(|s| s.update(&tables::TASKS, task_id, updates, "update_task"))
    }

    async fn delete_task(&self, task_id: &str) -> Result<bool> {
        self.with_state(|s| Ok(s.delete(&plan::by_key(&tables::TASKS, task_id), "delete_task")? > 0))
    }

    async fn archive_task(&self, task_id: &str, archived_by: &str) -> Result<Option<Record>> {
        let updates = archive_updates(archived_by);
        self.with_state(|s| s.update(&tables::TASKS, task_id, updates, "archive_task"))
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
        let rows = self.with_state(|s| Ok(s.select(&plan::active_project_tasks())))?;
        Ok(count_by_project(&rows))
    }
}

#[async_trait]
impl DocumentVersionRepository for FakeRepository {
    async fn create_document_version(&self, version: Record) -> Result<Record> {
        self.with_state(|s| {
            let mut version = version;
            if version.get("version_number").is_none_or(Value::is_null) {
                let latest = s.first(plan::document_versions(
                    str_field(&version, "project_id"),
                    str_field(&version, "field_name"),
                ));
                version.insert(
                    "version_number".to_string(),
                    Value::from(plan::next_version_number(latest.as_ref())),
                );
            }
            let row = prepare_insert(&tables::DOCUMENT_VERSIONS, version)?;
            s.insert(&tables::DOCUMENT_VERSIONS, row, "create_document_version")
        })
    }

    async fn list_document_versions(&self, project_id: &str, field_name: Option<&str>) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::document_versions(Some(project_id), field_name))))
    }

    async fn get_document_version_by_id(&self, version_id: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by_key(&tables::DOCUMENT_VERSIONS, version_id))))
    }

    async fn get_latest_document_version(&self, project_id: &str, field_name: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::document_versions(Some(project_id), Some(field_name)))))
    }

    async fn delete_document_version(&self, version_id: &str) -> Result<bool> {
        self.with_state(|s| {
            Ok(s.delete(
                &plan::by_key(&tables::DOCUMENT_VERSIONS, version_id),
                "delete_document_version",
            )? > 0)
        })
    }
}

#[async_trait]
impl ProjectSourceRepository for FakeRepository {
    async fn link_project_source(
        &self,
        project_id: &str,
        source_id: &str,
        notes: Option<&str>,
        created_by: &str,
    ) -> Result<Record> {
        self.with_state(|s| {
            if let Some(existing) = s.first(plan::project_source(project_id, source_id)) {
                return Ok(existing);
            }
            let row = prepare_insert(
                &tables::PROJECT_SOURCES,
                link_record(project_id, source_id, notes, created_by),
            )?;
            s.insert(&tables::PROJECT_SOURCES, row, "link_project_source")
        })
    }

    async fn unlink_project_source(&self, project_id: &str, source_id: &str) -> Result<bool> {
        self.with_state(|s| {
            Ok(s.delete(
                &plan::project_source(project_id, source_id),
                "unlink_project_source",
            )? > 0)
        })
    }

    async fn list_project_sources(&self, project_id: &str) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::project_sources_by("project_id", project_id))))
    }

    async fn list_projects_for_source(&self, source_id: &str) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::project_sources_by("source_id", source_id))))
    }
}
