//! Project management operation groups.

use crate::Result;
use crate::models::{Record, TaskFilter, TaskStatusCounts};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Projects.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Creates a project.
    async fn create_project(&self, project: Record) -> Result<Record>;

    /// Fetches a project.
    async fn get_project_by_id(&self, project_id: &str) -> Result<Option<Record>>;

    /// Lists projects, newest first.
    ///
    /// With `include_content = false` the `docs`, `features` and `data`
    /// columns are omitted.
    async fn list_projects(&self, include_content: bool) -> Result<Vec<Record>>;

    /// Merges `updates` onto a project. Returns `None` if absent.
    async fn update_project(&self, project_id: &str, updates: Record) -> Result<Option<Record>>;

    /// Deletes a project with its tasks, document versions and source links.
    async fn delete_project(&self, project_id: &str) -> Result<bool>;

    /// Unpins every project except `project_id`. Returns how many changed.
    async fn unpin_all_projects_except(&self, project_id: &str) -> Result<u64>;

    /// Returns the `features` list of a project, or `None` if absent.
    async fn get_project_features(&self, project_id: &str) -> Result<Option<Vec<Value>>>;
}

/// Project tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Creates a task.
    async fn create_task(&self, task: Record) -> Result<Record>;

    /// Fetches a task, archived or not.
    async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Record>>;

    /// Lists tasks matching `filter`, ordered by `task_order` then creation.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Record>>;

    /// Merges `updates` onto a task. Returns `None` if absent.
    async fn update_task(&self, task_id: &str, updates: Record) -> Result<Option<Record>>;

    /// Removes a task row.
    async fn delete_task(&self, task_id: &str) -> Result<bool>;

    /// Soft-deletes a task. Returns `None` if absent.
    async fn archive_task(&self, task_id: &str, archived_by: &str) -> Result<Option<Record>>;

    /// Lists non-archived tasks of a project in one status.
    async fn get_tasks_by_project_and_status(&self, project_id: &str, status: &str) -> Result<Vec<Record>>;

    /// Counts non-archived tasks of a project by status.
    async fn get_task_counts_by_project(&self, project_id: &str) -> Result<TaskStatusCounts>;

    /// Counts non-archived tasks by project and status.
    async fn get_all_project_task_counts(&self) -> Result<BTreeMap<String, TaskStatusCounts>>;
}

/// Versioned snapshots of project JSON fields.
#[async_trait]
pub trait DocumentVersionRepository: Send + Sync {
    /// Stores a version, assigning the next `version_number` for its
    /// `(project_id, field_name)` when absent.
    async fn create_document_version(&self, version: Record) -> Result<Record>;

    /// Lists versions of a project, newest first.
    async fn list_document_versions(&self, project_id: &str, field_name: Option<&str>) -> Result<Vec<Record>>;

    /// Fetches a version.
    async fn get_document_version_by_id(&self, version_id: &str) -> Result<Option<Record>>;

    /// Fetches the highest version of a project field.
    async fn get_latest_document_version(&self, project_id: &str, field_name: &str) -> Result<Option<Record>>;

    /// Deletes a version.
    async fn delete_document_version(&self, version_id: &str) -> Result<bool>;
}

/// Links between projects and knowledge sources.
#[async_trait]
pub trait ProjectSourceRepository: Send + Sync {
    /// Links a source to a project. Linking twice returns the existing link.
    async fn link_project_source(
        &self,
        project_id: &str,
        source_id: &str,
        notes: Option<&str>,
        created_by: &str,
    ) -> Result<Record>;

    /// Removes a link. Returns `true` iff it existed.
    async fn unlink_project_source(&self, project_id: &str, source_id: &str) -> Result<bool>;

    /// Lists the links of a project.
    async fn list_project_sources(&self, project_id: &str) -> Result<Vec<Record>>;

    /// Lists the links of a source.
    async fn list_projects_for_source(&self, source_id: &str) -> Result<Vec<Record>>;
}
