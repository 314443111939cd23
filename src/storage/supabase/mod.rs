//! Supabase repository over PostgREST.
//!
//! Tables live under `{SUPABASE_URL}/rest/v1/{prefix}{table}` and are
//! addressed with the service-role key. Server-side columns are native
//! (`UUID`, `JSONB`, `VECTOR`), so records pass through unchanged apart from
//! vector text decoding.
//!
//! Vector and hybrid search call the project's stored functions
//! (`match_documents`, `match_code_examples`, `hybrid_search`). Multi-step
//! writes are ordered requests without a surrounding transaction: upserts
//! read before they write, and cascades delete children before the parent so
//! a failing step never orphans them.

mod client;
mod knowledge;
mod params;
mod projects;
mod system;

pub use client::{RestClient, parse_content_range, status_error};

use crate::config::SupabaseConfig;
use crate::models::Record;
use crate::schema::tables;
use crate::storage::metrics::observe;
use crate::storage::record::strip;
use crate::storage::rpc::RpcCall;
use crate::storage::search::EMBEDDING_COLUMN;
use crate::storage::traits::DatabaseRepository;
use crate::Result;
use std::future::Future;
use std::time::Instant;
use tracing::instrument;

/// Backend name used in metrics and logs.
const BACKEND: &str = "supabase";

/// Supabase-backed repository.
#[derive(Debug, Clone)]
pub struct SupabaseRepository {
    rest: RestClient,
}

impl SupabaseRepository {
    /// Creates a repository for the configured project.
    ///
    /// No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the URL or key is missing.
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let rest = RestClient::new(config)?;
        tracing::info!(endpoint = rest.base_url(), "Created Supabase repository");
        Ok(Self { rest })
    }

    /// Times an operation and records its outcome.
    #[instrument(skip(self, f), fields(backend = BACKEND))]
    async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let start = Instant::now();
        let result = f.await;
        observe(BACKEND, operation, start, &result);
        result
    }

    /// Runs a search function and returns its rows without embeddings.
    async fn search(&self, call: RpcCall, operation: &'static str) -> Result<Vec<Record>> {
        let table = match call {
            RpcCall::MatchCodeExamples { .. } => &tables::CODE_EXAMPLES,
            RpcCall::MatchDocuments { .. } | RpcCall::HybridSearch { .. } => &tables::DOCUMENTS,
        };
        self.call(operation, async {
            let value = self
                .rest
                .rpc(call.function_name(), &call.to_params(), operation)
                .await?;
            let mut rows = client::rows_from_value(table, value);
            for row in &mut rows {
                strip(row, &[EMBEDDING_COLUMN]);
            }
            Ok(rows)
        })
        .await
    }
}

impl DatabaseRepository for SupabaseRepository {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
