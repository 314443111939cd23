//! Query options shared by list operations.

/// Pagination for list operations.
///
/// `limit: None` means "no limit", which is what count/list consistency checks
/// rely on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Number of rows to skip.
    pub offset: usize,
}

impl ListOptions {
    /// Returns options without limit or offset.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            limit: None,
            offset: 0,
        }
    }

    /// Sets the limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Applies the window to an already ordered vector.
    #[must_use]
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let iter = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Filter for [`list_tasks`](crate::storage::TaskRepository::list_tasks).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks of this project.
    pub project_id: Option<String>,
    /// Only tasks with this status.
    pub status: Option<String>,
    /// Only tasks assigned to this assignee.
    pub assignee: Option<String>,
    /// Only subtasks of this parent.
    pub parent_task_id: Option<String>,
    /// Include soft-deleted (archived) tasks.
    pub include_archived: bool,
    /// Drop the `sources` and `code_examples` JSON columns from results.
    pub exclude_large_fields: bool,
}

impl TaskFilter {
    /// Creates an empty filter (all non-archived tasks).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Restricts to one status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Restricts to one assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Includes archived tasks.
    #[must_use]
    pub const fn including_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    /// Excludes large JSON fields.
    #[must_use]
    pub const fn without_large_fields(mut self) -> Self {
        self.exclude_large_fields = true;
        self
    }
}
