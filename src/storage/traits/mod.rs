//! Repository contract.
//!
//! The contract is split into one trait per operation group so services can
//! depend on the narrowest surface they need; [`DatabaseRepository`] bundles
//! all fourteen for the factory.

mod knowledge;
mod projects;
mod system;

pub use knowledge::{
    CodeExampleRepository, CrawledPageRepository, DocumentRepository, PageMetadataRepository,
    SourceRepository,
};
pub use projects::{
    DocumentVersionRepository, ProjectRepository, ProjectSourceRepository, TaskRepository,
};
pub use system::{
    MigrationRepository, PromptRepository, RpcRepository, SettingsRepository, TableCountRepository,
};

/// The complete repository contract.
///
/// Every operation is asynchronous, returns detached [`Record`](crate::Record)
/// copies, and reports absence as `None`/`false`/empty rather than an error.
pub trait DatabaseRepository:
    PageMetadataRepository
    + DocumentRepository
    + CodeExampleRepository
    + SettingsRepository
    + ProjectRepository
    + TaskRepository
    + SourceRepository
    + CrawledPageRepository
    + DocumentVersionRepository
    + ProjectSourceRepository
    + RpcRepository
    + PromptRepository
    + TableCountRepository
    + MigrationRepository
{
    /// Short backend name used in logs and metrics.
    fn backend_name(&self) -> &'static str;
}
