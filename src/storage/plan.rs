//! Row selections and cascades behind each repository operation.
//!
//! Backends execute these plans natively; defining them once keeps filter,
//! ordering and count semantics identical across SQLite, Supabase and the
//! Fake.

use super::query::{Filter, Select, order};
use super::record::str_field;
use crate::models::{ListOptions, Record, TaskFilter, TaskStatusCounts};
use crate::schema::{TableDefinition, storage_table, tables};
use crate::{Error, Result};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Columns omitted by `list_projects(include_content = false)`.
pub const PROJECT_CONTENT_COLUMNS: &[&str] = &["docs", "features", "data"];

/// Columns omitted by `TaskFilter::exclude_large_fields`.
pub const TASK_LARGE_COLUMNS: &[&str] = &["sources", "code_examples"];

/// One child-table delete of a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeStep {
    /// Child table.
    pub table: &'static TableDefinition,
    /// Column referencing the parent key.
    pub column: &'static str,
}

/// Children removed before a source, in order.
pub const SOURCE_CASCADE: [CascadeStep; 5] = [
    CascadeStep {
        table: &tables::DOCUMENTS,
        column: "source_id",
    },
    CascadeStep {
        table: &tables::CODE_EXAMPLES,
        column: "source_id",
    },
    CascadeStep {
        table: &tables::CRAWLED_PAGES,
        column: "source_id",
    },
    CascadeStep {
        table: &tables::PAGE_METADATA,
        column: "source_id",
    },
    CascadeStep {
        table: &tables::PROJECT_SOURCES,
        column: "source_id",
    },
];

/// Children removed before a project, in order.
pub const PROJECT_CASCADE: [CascadeStep; 3] = [
    CascadeStep {
        table: &tables::TASKS,
        column: "project_id",
    },
    CascadeStep {
        table: &tables::DOCUMENT_VERSIONS,
        column: "project_id",
    },
    CascadeStep {
        table: &tables::PROJECT_SOURCES,
        column: "project_id",
    },
];

impl CascadeStep {
    /// Selects the child rows of `parent_key`.
    #[must_use]
    pub fn select(&self, parent_key: &str) -> Select {
        Select::from(self.table).eq(self.column, parent_key)
    }
}

/// Selects one row by a column value.
#[must_use]
pub fn by(table: &'static TableDefinition, column: &'static str, value: &str) -> Select {
    Select::from(table).eq(column, value).limit(1)
}

/// Selects one row by primary key.
#[must_use]
pub fn by_key(table: &'static TableDefinition, key: &str) -> Select {
    by(table, table.primary_key().name, key)
}

/// Pages of a source.
#[must_use]
pub fn pages_by_source(source_id: &str, options: ListOptions) -> Select {
    Select::from(&tables::PAGE_METADATA)
        .eq("source_id", source_id)
        .order_by(order::BY_URL)
        .window(options)
}

/// Candidate documents for a search.
///
/// Vector search only considers rows with an embedding; hybrid search also
/// scores keyword-only rows.
#[must_use]
pub fn document_search(filter_metadata: Option<&Record>, require_embedding: bool) -> Select {
    let select = Select::from(&tables::DOCUMENTS)
        .contains("metadata", filter_metadata)
        .order_by(order::BY_URL_CHUNK);
    if require_embedding {
        select.filter(Filter::NotNull("embedding"))
    } else {
        select
    }
}

/// Candidate code examples for a vector search.
#[must_use]
pub fn code_example_search(filter_metadata: Option<&Record>, source_id: Option<&str>) -> Select {
    let select = Select::from(&tables::CODE_EXAMPLES)
        .filter(Filter::NotNull("embedding"))
        .contains("metadata", filter_metadata)
        .order_by(order::BY_URL_CHUNK);
    match source_id {
        Some(source_id) => select.eq("source_id", source_id),
        None => select,
    }
}

/// Code examples of a source.
#[must_use]
pub fn code_examples_by_source(source_id: &str, options: ListOptions) -> Select {
    Select::from(&tables::CODE_EXAMPLES)
        .eq("source_id", source_id)
        .order_by(order::BY_URL_CHUNK)
        .window(options)
}

/// Settings, optionally of one category.
#[must_use]
pub fn settings(category: Option<&str>) -> Select {
    let select = Select::from(&tables::SETTINGS).order_by(order::SETTINGS);
    match category {
        Some(category) => select.eq("category", category),
        None => select,
    }
}

/// All projects, newest first.
#[must_use]
pub fn projects() -> Select {
    Select::from(&tables::PROJECTS).order_by(order::NEWEST_FIRST)
}

/// Pinned projects other than `project_id`.
#[must_use]
pub fn pinned_projects_except(project_id: &str) -> Select {
    Select::from(&tables::PROJECTS)
        .eq("pinned", true)
        .filter(Filter::Ne("id", Value::from(project_id)))
}

/// Tasks matching a filter.
#[must_use]
pub fn tasks(filter: &TaskFilter) -> Select {
    let mut select = Select::from(&tables::TASKS).order_by(order::TASKS);
    if let Some(project_id) = &filter.project_id {
        select = select.eq("project_id", project_id.as_str());
    }
    if let Some(status) = &filter.status {
        select = select.eq("status", status.as_str());
    }
    if let Some(assignee) = &filter.assignee {
        select = select.eq("assignee", assignee.as_str());
    }
    if let Some(parent) = &filter.parent_task_id {
        select = select.eq("parent_task_id", parent.as_str());
    }
    if !filter.include_archived {
        select = select.eq("archived", false);
    }
    select
}

/// Non-archived tasks that belong to some project.
#[must_use]
pub fn active_project_tasks() -> Select {
    Select::from(&tables::TASKS)
        .eq("archived", false)
        .filter(Filter::NotNull("project_id"))
}

/// Sources, optionally of one knowledge type.
#[must_use]
pub fn sources(knowledge_type: Option<&str>) -> Select {
    let needle = knowledge_type.and_then(|kt| match json!({ "knowledge_type": kt }) {
        Value::Object(map) => Some(map),
        _ => None,
    });
    Select::from(&tables::SOURCES)
        .contains("metadata", needle.as_ref())
        .order_by(order::NEWEST_FIRST)
}

/// A crawled page by URL, optionally within one source.
#[must_use]
pub fn crawled_page(url: &str, source_id: Option<&str>) -> Select {
    let select = Select::from(&tables::CRAWLED_PAGES)
        .eq("url", url)
        .order_by(order::CREATED)
        .limit(1);
    match source_id {
        Some(source_id) => select.eq("source_id", source_id),
        None => select,
    }
}

/// Crawled pages of a source.
#[must_use]
pub fn crawled_pages_by_source(source_id: &str, options: ListOptions) -> Select {
    Select::from(&tables::CRAWLED_PAGES)
        .eq("source_id", source_id)
        .order_by(order::BY_URL)
        .window(options)
}

/// Versions of a project, optionally of one field, newest first.
#[must_use]
pub fn document_versions(project_id: Option<&str>, field_name: Option<&str>) -> Select {
    let mut select = Select::from(&tables::DOCUMENT_VERSIONS).order_by(order::VERSIONS);
    select = match project_id {
        Some(project_id) => select.eq("project_id", project_id),
        None => select.filter(Filter::IsNull("project_id")),
    };
    match field_name {
        Some(field_name) => select.eq("field_name", field_name),
        None => select,
    }
}

/// The link between a project and a source.
#[must_use]
pub fn project_source(project_id: &str, source_id: &str) -> Select {
    Select::from(&tables::PROJECT_SOURCES)
        .eq("project_id", project_id)
        .eq("source_id", source_id)
}

/// Links by one side.
#[must_use]
pub fn project_sources_by(column: &'static str, value: &str) -> Select {
    Select::from(&tables::PROJECT_SOURCES)
        .eq(column, value)
        .order_by(order::LINKS)
}

/// All prompts by name.
#[must_use]
pub fn prompts() -> Select {
    Select::from(&tables::PROMPTS).order_by(order::PROMPTS)
}

/// All applied migrations by version.
#[must_use]
pub fn migrations() -> Select {
    Select::from(&tables::MIGRATIONS).order_by(order::MIGRATIONS)
}

/// Column-equality count over a table named at runtime.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for unknown tables or columns.
pub fn table_count(table: &str, filters: &Record) -> Result<Select> {
    let definition = storage_table(table)
        .ok_or_else(|| Error::InvalidInput(format!("unknown table '{table}'")))?;
    let mut select = Select::from(definition);
    for (column, value) in filters {
        let field = definition.field(column).ok_or_else(|| {
            Error::InvalidInput(format!("unknown column '{column}' on table '{table}'"))
        })?;
        select = match value {
            Value::Null => select.filter(Filter::IsNull(field.name)),
            other => select.filter(Filter::Eq(field.name, other.clone())),
        };
    }
    Ok(select)
}

/// Extracts the next version number from the newest existing version.
#[must_use]
pub fn next_version_number(latest: Option<&Record>) -> i64 {
    latest
        .and_then(|r| r.get("version_number"))
        .and_then(Value::as_i64)
        .map_or(1, |n| n + 1)
}

/// `{"pinned": false}`.
#[must_use]
pub fn unpinned() -> Record {
    let mut updates = Record::new();
    updates.insert("pinned".to_string(), Value::Bool(false));
    updates
}

/// Columns set by `archive_task`.
#[must_use]
pub fn archive_updates(archived_by: &str) -> Record {
    match json!({
        "archived": true,
        "archived_at": crate::current_timestamp(),
        "archived_by": archived_by,
    }) {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// New `project_sources` row.
#[must_use]
pub fn link_record(project_id: &str, source_id: &str, notes: Option<&str>, created_by: &str) -> Record {
    match json!({
        "project_id": project_id,
        "source_id": source_id,
        "notes": notes,
        "created_by": created_by,
    }) {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// The `features` column as a list.
#[must_use]
pub fn features_of(project: &Record) -> Vec<Value> {
    match project.get("features") {
        Some(Value::Array(items)) => items.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

/// Groups task rows by `project_id` and counts statuses.
#[must_use]
pub fn count_by_project(rows: &[Record]) -> BTreeMap<String, TaskStatusCounts> {
    let mut counts: BTreeMap<String, TaskStatusCounts> = BTreeMap::new();
    for row in rows {
        if let Some(project_id) = str_field(row, "project_id") {
            counts
                .entry(project_id.to_string())
                .or_default()
                .record(str_field(row, "status"));
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_excludes_archived_by_default() {
        let select = tasks(&TaskFilter::new().with_project("p1"));
        assert!(select.filters.contains(&Filter::Eq("archived", Value::Bool(false))));
        let select = tasks(&TaskFilter::new().including_archived());
        assert!(!select.filters.iter().any(|f| f.column() == "archived"));
    }

    #[test]
    fn test_table_count_validates_names() {
        assert!(table_count("documents", &Record::new()).is_ok());
        assert!(matches!(
            table_count("nope", &Record::new()),
            Err(Error::InvalidInput(_))
        ));
        let mut filters = Record::new();
        filters.insert("bogus".to_string(), Value::from(1));
        assert!(matches!(
            table_count("documents", &filters),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sources_filter_on_knowledge_type() {
        let select = sources(Some("technical"));
        assert!(select.has_containment());
        assert!(!sources(None).has_containment());
    }

    #[test]
    fn test_next_version_number() {
        assert_eq!(next_version_number(None), 1);
        let mut latest = Record::new();
        latest.insert("version_number".to_string(), Value::from(4));
        assert_eq!(next_version_number(Some(&latest)), 5);
    }

    #[test]
    fn test_cascades_reference_existing_columns() {
        for step in SOURCE_CASCADE.iter().chain(PROJECT_CASCADE.iter()) {
            assert!(step.table.has_column(step.column));
        }
    }
}
