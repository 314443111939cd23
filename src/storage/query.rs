//! Backend-neutral row selection.
//!
//! A [`Select`] names a table, equality/containment filters, a fixed ordering
//! and a pagination window. The SQLite backend renders it to SQL, the
//! Supabase backend to PostgREST query parameters, and the Fake evaluates it
//! in memory with [`Select::matches`] and [`sort_records`].

use super::search::json_contains;
use crate::models::{ListOptions, Record};
use crate::schema::TableDefinition;
use serde_json::Value;
use std::cmp::Ordering;

/// A row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value.
    Eq(&'static str, Value),
    /// Column does not equal the value (nulls pass).
    Ne(&'static str, Value),
    /// Column is NULL or absent.
    IsNull(&'static str),
    /// Column holds a non-null value.
    NotNull(&'static str),
    /// Column's JSON value contains the given JSON (`@>` semantics).
    Contains(&'static str, Value),
}

impl Filter {
    /// Returns the filtered column.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Eq(column, _)
            | Self::Ne(column, _)
            | Self::IsNull(column)
            | Self::NotNull(column)
            | Self::Contains(column, _) => column,
        }
    }

    /// Evaluates the predicate against an in-memory row.
    #[must_use]
    pub fn matches(&self, row: &Record) -> bool {
        match self {
            Self::Eq(column, expected) => row
                .get(*column)
                .is_some_and(|actual| values_equal(actual, expected)),
            Self::Ne(column, expected) => !row
                .get(*column)
                .is_some_and(|actual| values_equal(actual, expected)),
            Self::IsNull(column) => row.get(*column).is_none_or(Value::is_null),
            Self::NotNull(column) => row.get(*column).is_some_and(|v| !v.is_null()),
            Self::Contains(column, needle) => row
                .get(*column)
                .is_some_and(|haystack| json_contains(haystack, needle)),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    /// Sorted column.
    pub column: &'static str,
    /// Descending when true.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending on `column`.
    #[must_use]
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    /// Descending on `column`.
    #[must_use]
    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Fixed orderings of list operations.
///
/// Nulls sort first ascending and last descending on every backend.
pub mod order {
    use super::OrderBy;

    /// Page metadata and crawled pages.
    pub const BY_URL: &[OrderBy] = &[OrderBy::asc("url")];
    /// Document chunks and code examples.
    pub const BY_URL_CHUNK: &[OrderBy] = &[OrderBy::asc("url"), OrderBy::asc("chunk_number")];
    /// Projects and sources.
    pub const NEWEST_FIRST: &[OrderBy] = &[OrderBy::desc("created_at")];
    /// Tasks.
    pub const TASKS: &[OrderBy] = &[OrderBy::asc("task_order"), OrderBy::asc("created_at")];
    /// Document versions.
    pub const VERSIONS: &[OrderBy] = &[OrderBy::desc("version_number")];
    /// Settings.
    pub const SETTINGS: &[OrderBy] = &[OrderBy::asc("key")];
    /// Prompts.
    pub const PROMPTS: &[OrderBy] = &[OrderBy::asc("prompt_name")];
    /// Applied migrations.
    pub const MIGRATIONS: &[OrderBy] = &[OrderBy::asc("version")];
    /// Project/source links.
    pub const LINKS: &[OrderBy] = &[OrderBy::asc("linked_at")];
    /// Insertion order.
    pub const CREATED: &[OrderBy] = &[OrderBy::asc("created_at")];
}

/// A row selection on one table.
#[derive(Debug, Clone)]
pub struct Select {
    /// Target table.
    pub table: &'static TableDefinition,
    /// Conjunctive filters.
    pub filters: Vec<Filter>,
    /// Sort keys.
    pub order: &'static [OrderBy],
    /// Pagination window.
    pub window: ListOptions,
}

impl Select {
    /// Selects every row of `table`.
    #[must_use]
    pub const fn from(table: &'static TableDefinition) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: &[],
            window: ListOptions::all(),
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    /// Adds an arbitrary filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds an optional JSON containment filter.
    #[must_use]
    pub fn contains(mut self, column: &'static str, needle: Option<&Record>) -> Self {
        if let Some(needle) = needle.filter(|n| !n.is_empty()) {
            self.filters
                .push(Filter::Contains(column, Value::Object(needle.clone())));
        }
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub const fn order_by(mut self, order: &'static [OrderBy]) -> Self {
        self.order = order;
        self
    }

    /// Sets the pagination window.
    #[must_use]
    pub const fn window(mut self, window: ListOptions) -> Self {
        self.window = window;
        self
    }

    /// Limits to `n` rows.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.window.limit = Some(n);
        self
    }

    /// Returns true if every filter matches.
    #[must_use]
    pub fn matches(&self, row: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Returns true if any filter needs application-side evaluation.
    #[must_use]
    pub fn has_containment(&self) -> bool {
        self.filters
            .iter()
            .any(|f| matches!(f, Filter::Contains(..)))
    }

    /// Filters, sorts and windows an in-memory row set.
    #[must_use]
    pub fn apply(&self, rows: impl IntoIterator<Item = Record>) -> Vec<Record> {
        let mut selected: Vec<Record> = rows.into_iter().filter(|r| self.matches(r)).collect();
        sort_records(&mut selected, self.order);
        self.window.apply(selected)
    }
}

/// Stable sort of records by the given keys.
pub fn sort_records(rows: &mut [Record], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in order {
            let ordering = compare_values(a.get(key.column), b.get(key.column));
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Total order over optional JSON values.
///
/// Null < boolean < number < string < array < object.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or_default()
                .total_cmp(&y.as_f64().unwrap_or_default()),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}
