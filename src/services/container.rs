use super::RepositoryFactory;
use crate::Result;
use crate::config::{DalConfig, RepositoryKind};
use crate::storage::DatabaseRepository;
use std::sync::Arc;

/// Carries the process-wide repository to the services that need it.
///
/// Built once at startup and passed down by value or reference; cloning is
/// cheap and every clone shares the same repository. Tests build their own
/// container around a fresh in-memory repository instead of touching global
/// state.
#[derive(Clone)]
pub struct DependencyContainer {
    config: Arc<DalConfig>,
    repository: Arc<dyn DatabaseRepository>,
}

impl std::fmt::Debug for DependencyContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyContainer")
            .field("backend", &self.config.repository)
            .finish_non_exhaustive()
    }
}

impl DependencyContainer {
    /// Builds the repository selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns the factory error if the backend cannot be created.
    pub async fn from_config(config: DalConfig) -> Result<Self> {
        let repository = RepositoryFactory::create(&config).await?;
        Ok(Self {
            config: Arc::new(config),
            repository,
        })
    }

    /// Loads configuration for the running process and builds the repository.
    ///
    /// # Errors
    ///
    /// Returns configuration or factory errors.
    pub async fn load() -> Result<Self> {
        Self::from_config(DalConfig::load()?).await
    }

    /// Wraps an existing repository.
    #[must_use]
    pub fn with_repository(config: DalConfig, repository: Arc<dyn DatabaseRepository>) -> Self {
        Self {
            config: Arc::new(config),
            repository,
        }
    }

    /// A container around a fresh in-memory repository.
    #[must_use]
    pub fn fake() -> Self {
        Self::with_repository(
            DalConfig::new().with_repository(RepositoryKind::Fake),
            RepositoryFactory::create_fake(),
        )
    }

    /// Shared handle to the repository.
    #[must_use]
    pub fn repository(&self) -> Arc<dyn DatabaseRepository> {
        Arc::clone(&self.repository)
    }

    /// Configuration the container was built from.
    #[must_use]
    pub fn config(&self) -> &DalConfig {
        &self.config
    }

    /// Selected backend.
    #[must_use]
    pub fn backend(&self) -> RepositoryKind {
        self.config.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_clones_share_repository() {
        let container = DependencyContainer::fake();
        let other = container.clone();
        let setting = json!({"key": "theme", "value": "dark", "category": "ui"});
        container
            .repository()
            .upsert_setting(setting.as_object().cloned().unwrap())
            .await
            .unwrap();
        let found = other.repository().get_setting("theme").await.unwrap();
        assert_eq!(found.unwrap()["value"], "dark");
        assert_eq!(other.backend(), RepositoryKind::Fake);
    }

    #[tokio::test]
    async fn test_separate_containers_are_isolated() {
        let first = DependencyContainer::fake();
        let second = DependencyContainer::fake();
        let setting = json!({"key": "k", "value": "v"});
        first
            .repository()
            .upsert_setting(setting.as_object().cloned().unwrap())
            .await
            .unwrap();
        assert!(second.repository().get_setting("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DalConfig::new()
            .with_repository(RepositoryKind::Sqlite)
            .with_sqlite_path(dir.path().join("c.db"));
        let container = DependencyContainer::from_config(config).await.unwrap();
        assert_eq!(container.backend(), RepositoryKind::Sqlite);
        assert!(container.repository().get_all_settings().await.unwrap().is_empty());
    }
}
