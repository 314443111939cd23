//! Crawled-knowledge operation groups.

use crate::Result;
use crate::models::{ListOptions, Record};
use async_trait::async_trait;

/// Per-page metadata of crawled sources.
#[async_trait]
pub trait PageMetadataRepository: Send + Sync {
    /// Fetches a page by id.
    async fn get_page_metadata_by_id(&self, page_id: &str) -> Result<Option<Record>>;

    /// Fetches a page by URL.
    async fn get_page_metadata_by_url(&self, url: &str) -> Result<Option<Record>>;

    /// Lists the pages of a source, ordered by URL.
    async fn list_pages_by_source(&self, source_id: &str, options: ListOptions) -> Result<Vec<Record>>;

    /// Counts the pages of a source.
    async fn get_page_count_by_source(&self, source_id: &str) -> Result<u64>;

    /// Upserts pages keyed by URL.
    ///
    /// Returns one stored row per input, in input order.
    async fn upsert_page_metadata_batch(&self, pages: Vec<Record>) -> Result<Vec<Record>>;

    /// Sets the chunk count of a page. Returns `None` if the page is absent.
    async fn update_page_chunk_count(&self, page_id: &str, chunk_count: i64) -> Result<Option<Record>>;
}

/// Embedded document chunks.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Ranks documents by cosine similarity to `embedding`.
    ///
    /// Results carry a `similarity` field and omit the embedding.
    async fn search_documents_vector(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>>;

    /// Ranks documents by blended vector and keyword relevance.
    ///
    /// Results carry `similarity` and `match_type` (`hybrid`, `vector` or
    /// `keyword`).
    async fn search_documents_hybrid(
        &self,
        query_text: &str,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>>;

    /// Fetches a document by id.
    async fn get_document_by_id(&self, id: &str) -> Result<Option<Record>>;

    /// Inserts one document, generating its id when absent.
    async fn insert_document(&self, document: Record) -> Result<Record>;

    /// Inserts documents, one output per input in order.
    async fn insert_documents_batch(&self, documents: Vec<Record>) -> Result<Vec<Record>>;

    /// Deletes every document of a source. Returns the number removed.
    async fn delete_documents_by_source(&self, source_id: &str) -> Result<u64>;

    /// Deletes every document chunk of a URL. Returns the number removed.
    async fn delete_documents_by_url(&self, url: &str) -> Result<u64>;
}

/// Code examples extracted from crawled pages.
#[async_trait]
pub trait CodeExampleRepository: Send + Sync {
    /// Ranks code examples by cosine similarity, optionally within one source.
    async fn search_code_examples(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
        source_id: Option<&str>,
    ) -> Result<Vec<Record>>;

    /// Inserts one code example.
    async fn insert_code_example(&self, example: Record) -> Result<Record>;

    /// Inserts code examples, one output per input in order.
    async fn insert_code_examples_batch(&self, examples: Vec<Record>) -> Result<Vec<Record>>;

    /// Deletes every code example of a source.
    async fn delete_code_examples_by_source(&self, source_id: &str) -> Result<u64>;

    /// Deletes every code example of a URL.
    async fn delete_code_examples_by_url(&self, url: &str) -> Result<u64>;

    /// Counts the code examples of a source.
    async fn get_code_example_count_by_source(&self, source_id: &str) -> Result<u64>;

    /// Lists the code examples of a source, ordered by URL then chunk.
    async fn list_code_examples_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>>;
}

/// Knowledge sources.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Lists sources, newest first, optionally by `metadata.knowledge_type`.
    async fn list_sources(&self, knowledge_type: Option<&str>) -> Result<Vec<Record>>;

    /// Fetches a source.
    async fn get_source_by_id(&self, source_id: &str) -> Result<Option<Record>>;

    /// Fetches sources in request order, skipping missing ids.
    async fn get_sources_by_ids(&self, source_ids: &[String]) -> Result<Vec<Record>>;

    /// Inserts a source or merges onto the existing one with the same
    /// `source_id`.
    async fn upsert_source(&self, source: Record) -> Result<Record>;

    /// Deep-merges `metadata` into a source. Returns `None` if absent.
    async fn update_source_metadata(&self, source_id: &str, metadata: Record) -> Result<Option<Record>>;

    /// Deletes a source and everything that references it.
    ///
    /// Documents, code examples, crawled pages, page metadata and project
    /// links go first; the source row is only removed if all of them
    /// succeed. Returns `true` iff the source existed.
    async fn delete_source(&self, source_id: &str) -> Result<bool>;
}

/// Raw crawled pages.
#[async_trait]
pub trait CrawledPageRepository: Send + Sync {
    /// Fetches a page by URL, optionally scoped to one source.
    async fn get_crawled_page_by_url(&self, url: &str, source_id: Option<&str>) -> Result<Option<Record>>;

    /// Inserts a page. Duplicate `(url, source_id)` is a constraint violation.
    async fn insert_crawled_page(&self, page: Record) -> Result<Record>;

    /// Inserts or merges a page keyed by `(url, source_id)`.
    async fn upsert_crawled_page(&self, page: Record) -> Result<Record>;

    /// Lists the pages of a source, ordered by URL.
    async fn list_crawled_pages_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>>;

    /// Counts the pages of a source.
    async fn get_crawled_page_count_by_source(&self, source_id: &str) -> Result<u64>;

    /// Deletes the pages of a source.
    async fn delete_crawled_pages_by_source(&self, source_id: &str) -> Result<u64>;
}
