//! Backend factory for repository initialization.
//!
//! This module centralizes backend creation so callers never name a concrete
//! repository type:
//!
//! ```text
//! RepositoryFactory
//!   ├── create(&DalConfig)        → Arc<dyn DatabaseRepository>
//!   ├── create_supabase(..)       → Arc<SupabaseRepository>
//!   ├── create_sqlite(..)         → Arc<SqliteRepository>
//!   └── create_fake()             → Arc<FakeRepository>
//! ```
//!
//! The backend is chosen once from [`DalConfig::repository`]; there is no
//! re-dispatch after construction.

use crate::config::{DalConfig, RepositoryKind, SqliteConfig, SupabaseConfig};
use crate::storage::{DatabaseRepository, FakeRepository, SqliteRepository, SupabaseRepository};
use crate::{Error, Result};
use std::sync::Arc;

/// Factory for creating repositories.
///
/// # Example
///
/// ```rust,ignore
/// use archon_dal::{DalConfig, RepositoryFactory};
///
/// let repository = RepositoryFactory::create(&DalConfig::load()?).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Creates the repository selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the selected backend is missing
    /// required settings, or the backend's own open error.
    pub async fn create(config: &DalConfig) -> Result<Arc<dyn DatabaseRepository>> {
        let repository: Arc<dyn DatabaseRepository> = match config.repository {
            RepositoryKind::Supabase => Self::create_supabase(&config.supabase)?,
            RepositoryKind::Sqlite => Self::create_sqlite(&config.sqlite).await?,
            RepositoryKind::Fake => Self::create_fake(),
        };
        tracing::info!(backend = %config.repository, "Created repository");
        Ok(repository)
    }

    /// Creates the Supabase repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the URL or service key is missing.
    pub fn create_supabase(config: &SupabaseConfig) -> Result<Arc<SupabaseRepository>> {
        SupabaseRepository::new(config)
            .map(Arc::new)
            .inspect_err(|e| tracing::error!(error = %e, "Failed to create Supabase repository"))
    }

    /// Opens the `SQLite` repository, applying bundled migrations.
    ///
    /// Opening and migrating run on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the open or migration error.
    pub async fn create_sqlite(config: &SqliteConfig) -> Result<Arc<SqliteRepository>> {
        let config = config.clone();
        let path = config.path.clone();
        let opened = tokio::task::spawn_blocking(move || {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| Error::ConnectionFailed {
                    operation: "create_sqlite_dir".to_string(),
                    cause: format!("{}: {e}", parent.display()),
                })?;
            }
            SqliteRepository::open(&config)
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: format!("blocking task failed: {e}"),
        })?;

        match opened {
            Ok(repository) => Ok(Arc::new(repository)),
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to open SQLite repository"
                );
                Err(e)
            },
        }
    }

    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn create_fake() -> Arc<FakeRepository> {
        Arc::new(FakeRepository::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::models::Record;
    use serde_json::json;
    use tempfile::TempDir;

    fn source(id: &str) -> Record {
        json!({"source_id": id, "title": id}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_fake() {
        let config = DalConfig::new().with_repository(RepositoryKind::Fake);
        let repository = RepositoryFactory::create(&config).await.unwrap();
        repository.upsert_source(source("a")).await.unwrap();
        assert!(repository.get_source_by_id("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_sqlite_makes_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("archon.db");
        let config = DalConfig::new()
            .with_repository(RepositoryKind::Sqlite)
            .with_sqlite_path(&path);
        let repository = RepositoryFactory::create(&config).await.unwrap();
        repository.upsert_source(source("b")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_create_supabase_requires_credentials() {
        let config = DalConfig::new().with_repository(RepositoryKind::Supabase);
        let err = RepositoryFactory::create(&config).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_create_supabase_with_credentials() {
        let mut config = DalConfig::new();
        config.supabase.url = Some("https://abc.supabase.co".to_string());
        config.supabase.service_key = Some("header.payload.sig".to_string().into());
        assert!(RepositoryFactory::create(&config).await.is_ok());
    }
}
