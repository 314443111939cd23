//! In-memory repository.
//!
//! Mirrors the full contract over per-table vectors guarded by one mutex.
//! Rows pass through the same projection, merge, ordering and search helpers
//! as the SQLite and Supabase backends, and cascades roll back as a unit, so
//! tests written against the Fake predict production behaviour.
//!
//! # Failure injection
//!
//! [`FakeRepository::fail_writes_to`] makes every write to one table fail,
//! which lets tests observe that a failing cascade step leaves the parent
//! row in place.

mod knowledge;
mod projects;
mod system;

use super::plan::{self, CascadeStep};
use super::query::Select;
use super::record::{prepare_update, prepare_upsert, primary_key_value};
use super::sqlite::acquire_lock;
use super::traits::DatabaseRepository;
use crate::models::Record;
use crate::schema::TableDefinition;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Backend name reported in logs.
const BACKEND: &str = "fake";

#[derive(Debug, Default)]
struct FakeState {
    tables: HashMap<&'static str, Vec<Record>>,
    failing: HashSet<String>,
}

/// In-memory repository for tests and local development.
#[derive(Debug, Default)]
pub struct FakeRepository {
    state: Mutex<FakeState>,
}

impl FakeRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write to `table` fail.
    pub fn fail_writes_to(&self, table: &str) {
        acquire_lock(&self.state).failing.insert(table.to_string());
    }

    /// Clears injected failures.
    pub fn clear_failures(&self) {
        acquire_lock(&self.state).failing.clear();
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> Result<T>) -> Result<T> {
        let mut state = acquire_lock(&self.state);
        f(&mut state)
    }
}

impl DatabaseRepository for FakeRepository {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

impl FakeState {
    fn rows(&self, table: &TableDefinition) -> &[Record] {
        self.tables.get(table.name).map_or(&[], Vec::as_slice)
    }

    fn select(&self, select: &Select) -> Vec<Record> {
        select.apply(self.rows(select.table).iter().cloned())
    }

    fn first(&self, select: Select) -> Option<Record> {
        self.select(&select.limit(1)).into_iter().next()
    }

    fn count(&self, select: &Select) -> u64 {
        let n = self
            .rows(select.table)
            .iter()
            .filter(|r| select.matches(r))
            .count();
        u64::try_from(n).unwrap_or(u64::MAX)
    }

    fn check_writable(&self, table: &TableDefinition, operation: &str) -> Result<()> {
        if self.failing.contains(table.name) {
            return Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("injected write failure on '{}'", table.name),
            });
        }
        Ok(())
    }

    /// Describes the first uniqueness conflict of `row`, skipping the row
    /// whose primary key is `skip_key`.
    fn conflict(&self, table: &TableDefinition, row: &Record, skip_key: Option<&str>) -> Option<String> {
        let pk = table.primary_key().name;
        for existing in self.rows(table) {
            if skip_key.is_some() && primary_key_value(table, existing) == skip_key {
                continue;
            }
            let same = |column: &str| {
                row.get(column)
                    .filter(|v| !v.is_null())
                    .is_some_and(|v| existing.get(column) == Some(v))
            };
            if same(pk) {
                return Some(format!("duplicate key {}.{pk}", table.name));
            }
            if let Some(field) = table.fields.iter().find(|f| f.unique && same(f.name)) {
                return Some(format!("duplicate value for unique {}.{}", table.name, field.name));
            }
            if let Some(index) = table
                .indexes
                .iter()
                .find(|i| i.unique && i.columns.iter().all(|c| same(*c)))
            {
                return Some(format!("duplicate value for unique index {}", index.name));
            }
        }
        None
    }

    fn insert(&mut self, table: &'static TableDefinition, row: Record, operation: &str) -> Result<Record> {
        self.check_writable(table, operation)?;
        if let Some(cause) = self.conflict(table, &row, None) {
            return Err(Error::ConstraintViolation {
                operation: operation.to_string(),
                cause,
            });
        }
        self.tables.entry(table.name).or_default().push(row.clone());
        Ok(row)
    }

    fn replace(&mut self, table: &'static TableDefinition, row: Record, operation: &str) -> Result<Record> {
        self.check_writable(table, operation)?;
        let key = primary_key_value(table, &row).map(str::to_string);
        if let Some(cause) = self.conflict(table, &row, key.as_deref()) {
            return Err(Error::ConstraintViolation {
                operation: operation.to_string(),
                cause,
            });
        }
        let rows = self.tables.entry(table.name).or_default();
        match rows
            .iter_mut()
            .find(|r| primary_key_value(table, r) == key.as_deref())
        {
            Some(slot) => *slot = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(row)
    }

    /// Deletes every row matching the select's filters (windows are ignored).
    fn delete(&mut self, select: &Select, operation: &str) -> Result<u64> {
        self.check_writable(select.table, operation)?;
        let Some(rows) = self.tables.get_mut(select.table.name) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !select.matches(r));
        Ok(u64::try_from(before - rows.len()).unwrap_or(u64::MAX))
    }

    fn upsert(&mut self, existing: Select, incoming: Record, operation: &str) -> Result<Record> {
        let table = existing.table;
        let current = self.first(existing);
        let row = prepare_upsert(table, current.as_ref(), incoming)?;
        if current.is_some() {
            self.replace(table, row, operation)
        } else {
            self.insert(table, row, operation)
        }
    }

    fn update(
        &mut self,
        table: &'static TableDefinition,
        key: &str,
        updates: Record,
        operation: &str,
    ) -> Result<Option<Record>> {
        let Some(existing) = self.first(plan::by_key(table, key)) else {
            return Ok(None);
        };
        let row = prepare_update(table, &existing, updates)?;
        self.replace(table, row, operation).map(Some)
    }

    /// Deletes children then the parent, restoring everything on failure.
    fn cascade(
        &mut self,
        steps: &[CascadeStep],
        parent: &'static TableDefinition,
        key: &str,
        operation: &str,
    ) -> Result<bool> {
        self.transaction(|state| {
            for step in steps {
                state.delete(&step.select(key), operation)?;
            }
            Ok(state.delete(&plan::by_key(parent, key), operation)? > 0)
        })
    }

    fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.tables.clone();
        let result = f(self);
        if result.is_err() {
            tracing::debug!(backend = BACKEND, "rolling back in-memory transaction");
            self.tables = snapshot;
        }
        result
    }
}
