use super::SupabaseRepository;
use crate::Result;
use crate::models::{ListOptions, Record};
use crate::schema::{TableDefinition, tables};
use crate::storage::plan::{self, SOURCE_CASCADE};
use crate::storage::query::Select;
use crate::storage::record::{prepare_insert, prepare_update, required_str};
use crate::storage::rpc::RpcCall;
use crate::storage::traits::{
    CodeExampleRepository, CrawledPageRepository, DocumentRepository, PageMetadataRepository,
    SourceRepository,
};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
impl PageMetadataRepository for SupabaseRepository {
    async fn get_page_metadata_by_id(&self, page_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_page_metadata_by_id";
        let select = plan::by_key(&tables::PAGE_METADATA, page_id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn get_page_metadata_by_url(&self, url: &str) -> Result<Option<Record>> {
        const OP: &str = "get_page_metadata_by_url";
        let select = plan::by(&tables::PAGE_METADATA, "url", url);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn list_pages_by_source(&self, source_id: &str, options: ListOptions) -> Result<Vec<Record>> {
        const OP: &str = "list_pages_by_source";
        let select = plan::pages_by_source(source_id, options);
        self.call(OP, self.rest.select(&select, OP)).await
    }

    async fn get_page_count_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "get_page_count_by_source";
        let select = plan::pages_by_source(source_id, ListOptions::all());
        self.call(OP, self.rest.count(&select, OP)).await
    }

    async fn upsert_page_metadata_batch(&self, pages: Vec<Record>) -> Result<Vec<Record>> {
        const OP: &str = "upsert_page_metadata_batch";
        self.call(OP, async {
            let mut stored = Vec::with_capacity(pages.len());
            for page in pages {
                let url = required_str(&page, tables::PAGE_METADATA.name, "url")?;
                let existing = plan::by(&tables::PAGE_METADATA, "url", url);
                stored.push(self.rest.upsert(existing, page, OP).await?);
            }
            Ok(stored)
        })
        .await
    }

    async fn update_page_chunk_count(&self, page_id: &str, chunk_count: i64) -> Result<Option<Record>> {
        const OP: &str = "update_page_chunk_count";
        let mut updates = Record::new();
        updates.insert("chunk_count".to_string(), Value::from(chunk_count));
        self.call(OP, self.rest.update(&tables::PAGE_METADATA, page_id, updates, OP))
            .await
    }
}

#[async_trait]
impl DocumentRepository for SupabaseRepository {
    async fn search_documents_vector(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>> {
        let call = RpcCall::MatchDocuments {
            query_embedding: embedding.to_vec(),
            match_count,
            filter_metadata: filter_metadata.cloned(),
        };
        self.search(call, "search_documents_vector").await
    }

    async fn search_documents_hybrid(
        &self,
        query_text: &str,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>> {
        let call = RpcCall::HybridSearch {
            query_text: query_text.to_string(),
            query_embedding: embedding.to_vec(),
            match_count,
            filter_metadata: filter_metadata.cloned(),
        };
        self.search(call, "search_documents_hybrid").await
    }

    async fn get_document_by_id(&self, id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_document_by_id";
        let select = plan::by_key(&tables::DOCUMENTS, id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn insert_document(&self, document: Record) -> Result<Record> {
        const OP: &str = "insert_document";
        let row = prepare_insert(&tables::DOCUMENTS, document)?;
        self.call(OP, self.rest.insert(&tables::DOCUMENTS, row, OP)).await
    }

    async fn insert_documents_batch(&self, documents: Vec<Record>) -> Result<Vec<Record>> {
        insert_batch(self, &tables::DOCUMENTS, documents, "insert_documents_batch").await
    }

    async fn delete_documents_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "delete_documents_by_source";
        let select = Select::from(&tables::DOCUMENTS).eq("source_id", source_id);
        self.call(OP, self.rest.delete(&select, OP)).await
    }

    async fn delete_documents_by_url(&self, url: &str) -> Result<u64> {
        const OP: &str = "delete_documents_by_url";
        let select = Select::from(&tables::DOCUMENTS).eq("url", url);
        self.call(OP, self.rest.delete(&select, OP)).await
    }
}

#[async_trait]
impl CodeExampleRepository for SupabaseRepository {
    async fn search_code_examples(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
        source_id: Option<&str>,
    ) -> Result<Vec<Record>> {
        let call = RpcCall::MatchCodeExamples {
            query_embedding: embedding.to_vec(),
            match_count,
            filter_metadata: filter_metadata.cloned(),
            source_id: source_id.map(str::to_string),
        };
        self.search(call, "search_code_examples").await
    }

    async fn insert_code_example(&self, example: Record) -> Result<Record> {
        const OP: &str = "insert_code_example";
        let row = prepare_insert(&tables::CODE_EXAMPLES, example)?;
        self.call(OP, self.rest.insert(&tables::CODE_EXAMPLES, row, OP)).await
    }

    async fn insert_code_examples_batch(&self, examples: Vec<Record>) -> Result<Vec<Record>> {
        insert_batch(self, &tables::CODE_EXAMPLES, examples, "insert_code_examples_batch").await
    }

    async fn delete_code_examples_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "delete_code_examples_by_source";
        let select = Select::from(&tables::CODE_EXAMPLES).eq("source_id", source_id);
        self.call(OP, self.rest.delete(&select, OP)).await
    }

    async fn delete_code_examples_by_url(&self, url: &str) -> Result<u64> {
        const OP: &str = "delete_code_examples_by_url";
        let select = Select::from(&tables::CODE_EXAMPLES).eq("url", url);
        self.call(OP, self.rest.delete(&select, OP)).await
    }

    async fn get_code_example_count_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "get_code_example_count_by_source";
        let select = plan::code_examples_by_source(source_id, ListOptions::all());
        self.call(OP, self.rest.count(&select, OP)).await
    }

    async fn list_code_examples_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        const OP: &str = "list_code_examples_by_source";
        let select = plan::code_examples_by_source(source_id, options);
        self.call(OP, self.rest.select(&select, OP)).await
    }
}

#[async_trait]
impl SourceRepository for SupabaseRepository {
    async fn list_sources(&self, knowledge_type: Option<&str>) -> Result<Vec<Record>> {
        const OP: &str = "list_sources";
        let select = plan::sources(knowledge_type);
        self.call(OP, self.rest.select(&select, OP)).await
    }

    async fn get_source_by_id(&self, source_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_source_by_id";
        let select = plan::by_key(&tables::SOURCES, source_id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn get_sources_by_ids(&self, source_ids: &[String]) -> Result<Vec<Record>> {
        const OP: &str = "get_sources_by_ids";
        self.call(OP, async {
            let mut found = Vec::with_capacity(source_ids.len());
            for id in source_ids {
                if let Some(row) = self.rest.first(plan::by_key(&tables::SOURCES, id), OP).await? {
                    found.push(row);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn upsert_source(&self, source: Record) -> Result<Record> {
        const OP: &str = "upsert_source";
        let existing = plan::by_key(
            &tables::SOURCES,
            required_str(&source, tables::SOURCES.name, "source_id")?,
        );
        self.call(OP, self.rest.upsert(existing, source, OP)).await
    }

    async fn update_source_metadata(&self, source_id: &str, metadata: Record) -> Result<Option<Record>> {
        const OP: &str = "update_source_metadata";
        self.call(OP, async {
            let Some(existing) = self
                .rest
                .first(plan::by_key(&tables::SOURCES, source_id), OP)
                .await?
            else {
                return Ok(None);
            };
            let mut updates = Record::new();
            updates.insert("metadata".to_string(), Value::Object(metadata));
            let row = prepare_update(&tables::SOURCES, &existing, updates)?;
            self.rest.replace(&tables::SOURCES, row, OP).await.map(Some)
        })
        .await
    }

    async fn delete_source(&self, source_id: &str) -> Result<bool> {
        const OP: &str = "delete_source";
        self.call(
            OP,
            self.rest.cascade(&SOURCE_CASCADE, &tables::SOURCES, source_id, OP),
        )
        .await
    }
}

#[async_trait]
impl CrawledPageRepository for SupabaseRepository {
    async fn get_crawled_page_by_url(&self, url: &str, source_id: Option<&str>) -> Result<Option<Record>> {
        const OP: &str = "get_crawled_page_by_url";
        let select = plan::crawled_page(url, source_id);
        self.call(OP, self.rest.first(select, OP)).await
    }

    async fn insert_crawled_page(&self, page: Record) -> Result<Record> {
        const OP: &str = "insert_crawled_page";
        let row = prepare_insert(&tables::CRAWLED_PAGES, page)?;
        self.call(OP, self.rest.insert(&tables::CRAWLED_PAGES, row, OP)).await
    }

    async fn upsert_crawled_page(&self, page: Record) -> Result<Record> {
        const OP: &str = "upsert_crawled_page";
        let url = required_str(&page, tables::CRAWLED_PAGES.name, "url")?;
        let source_id = required_str(&page, tables::CRAWLED_PAGES.name, "source_id")?;
        let existing = plan::crawled_page(url, Some(source_id));
        self.call(OP, self.rest.upsert(existing, page, OP)).await
    }

    async fn list_crawled_pages_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        const OP: &str = "list_crawled_pages_by_source";
        let select = plan::crawled_pages_by_source(source_id, options);
        self.call(OP, self.rest.select(&select, OP)).await
    }

    async fn get_crawled_page_count_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "get_crawled_page_count_by_source";
        let select = plan::crawled_pages_by_source(source_id, ListOptions::all());
        self.call(OP, self.rest.count(&select, OP)).await
    }

    async fn delete_crawled_pages_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "delete_crawled_pages_by_source";
        let select = Select::from(&tables::CRAWLED_PAGES).eq("source_id", source_id);
        self.call(OP, self.rest.delete(&select, OP)).await
    }
}

async fn insert_batch(
    repository: &SupabaseRepository,
    table: &'static TableDefinition,
    records: Vec<Record>,
    operation: &'static str,
) -> Result<Vec<Record>> {
    let rows = records
        .into_iter()
        .map(|r| prepare_insert(table, r))
        .collect::<Result<Vec<_>>>()?;
    repository
        .call(operation, repository.rest.insert_many(table, rows, operation))
        .await
}
