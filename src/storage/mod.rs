//! Repository backends.
//!
//! Every backend implements the [`DatabaseRepository`] contract:
//! - **Supabase**: PostgREST over HTTP, server-side search functions
//! - **SQLite**: embedded file database, application-side search
//! - **Fake**: in-memory double for tests
//!
//! The backends share one description of each operation ([`plan`] builds
//! backend-neutral [`query::Select`] plans) and one set of record rules
//! ([`record`] for projection and defaults, [`merge`] for metadata merges,
//! [`search`] for ranking), so the same call yields the same rows whichever
//! backend runs it.

// Allow cast precision loss for similarity scores.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - the connection guard lives for one call.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit enum handling.
#![allow(clippy::match_same_arms)]

pub mod fake;
pub mod merge;
pub mod metrics;
pub mod plan;
pub mod query;
pub mod record;
pub mod rpc;
pub mod search;
pub mod similarity;
pub mod sqlite;
pub mod supabase;
pub mod traits;

pub use fake::FakeRepository;
pub use sqlite::SqliteRepository;
pub use supabase::SupabaseRepository;
pub use traits::{
    CodeExampleRepository, CrawledPageRepository, DatabaseRepository, DocumentRepository,
    DocumentVersionRepository, MigrationRepository, PageMetadataRepository, ProjectRepository,
    ProjectSourceRepository, PromptRepository, RpcRepository, SettingsRepository,
    SourceRepository, TableCountRepository, TaskRepository,
};
