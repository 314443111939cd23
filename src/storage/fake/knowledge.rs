use super::FakeRepository;
use crate::Result;
use crate::models::{ListOptions, Record};
use crate::schema::tables;
use crate::storage::plan::{self, SOURCE_CASCADE};
use crate::storage::query::Select;
use crate::storage::record::{prepare_insert, prepare_update, required_str};
use crate::storage::search::{hybrid_rank, rank_by_similarity};
use crate::storage::traits::{
    CodeExampleRepository, CrawledPageRepository, DocumentRepository, PageMetadataRepository,
    SourceRepository,
};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
impl PageMetadataRepository for FakeRepository {
    async fn get_page_metadata_by_id(&self, page_id: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by_key(&tables::PAGE_METADATA, page_id))))
    }

    async fn get_page_metadata_by_url(&self, url: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by(&tables::PAGE_METADATA, "url", url))))
    }

    async fn list_pages_by_source(&self, source_id: &str, options: ListOptions) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::pages_by_source(source_id, options))))
    }

    async fn get_page_count_by_source(&self, source_id: &str) -> Result<u64> {
        self.with_state(|s| Ok(s.count(&plan::pages_by_source(source_id, ListOptions::all()))))
    }

    async fn upsert_page_metadata_batch(&self, pages: Vec<Record>) -> Result<Vec<Record>> {
        const OP: &str = "upsert_page_metadata_batch";
        self.with_state(|s| {
            s.transaction(|s| {
                pages
                    .into_iter()
                    .map(|page| {
                        let url = required_str(&page, tables::PAGE_METADATA.name, "url")?.to_string();
                        s.upsert(plan::by(&tables::PAGE_METADATA, "url", &url), page, OP)
                    })
                    .collect()
            })
        })
    }

    async fn update_page_chunk_count(&self, page_id: &str, chunk_count: i64) -> Result<Option<Record>> {
        let mut updates = Record::new();
        updates.insert("chunk_count".to_string(), Value::from(chunk_count));
        self.with_state(|s| s.update(&tables::PAGE_METADATA, page_id, updates, "update_page_chunk_count"))
    }
}

#[async_trait]
impl DocumentRepository for FakeRepository {
    async fn search_documents_vector(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>> {
        let candidates = self.with_state(|s| Ok(s.select(&plan::document_search(filter_metadata, true))))?;
        Ok(rank_by_similarity(candidates, embedding, match_count))
    }

    async fn search_documents_hybrid(
        &self,
        query_text: &str,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>> {
        let candidates = self.with_state(|s| Ok(s.select(&plan::document_search(filter_metadata, false))))?;
        Ok(hybrid_rank(candidates, query_text, embedding, match_count))
    }

    async fn get_document_by_id(&self, id: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by_key(&tables::DOCUMENTS, id))))
    }

    async fn insert_document(&self, document: Record) -> Result<Record> {
        let row = prepare_insert(&tables::DOCUMENTS, document)?;
        self.with_state(|s| s.insert(&tables::DOCUMENTS, row, "insert_document"))
    }

    async fn insert_documents_batch(&self, documents: Vec<Record>) -> Result<Vec<Record>> {
        insert_batch(self, &tables::DOCUMENTS, documents, "insert_documents_batch")
    }

    async fn delete_documents_by_source(&self, source_id: &str) -> Result<u64> {
        let select = Select::from(&tables::DOCUMENTS).eq("source_id", source_id);
        self.with_state(|s| s.delete(&select, "delete_documents_by_source"))
    }

    async fn delete_documents_by_url(&self, url: &str) -> Result<u64> {
        let select = Select::from(&tables::DOCUMENTS).eq("url", url);
        self.with_state(|s| s.delete(&select, "delete_documents_by_url"))
    }
}

#[async_trait]
impl CodeExampleRepository for FakeRepository {
    async fn search_code_examples(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
        source_id: Option<&str>,
    ) -> Result<Vec<Record>> {
        let candidates =
            self.with_state(|s| Ok(s.select(&plan::code_example_search(filter_metadata, source_id))))?;
        Ok(rank_by_similarity(candidates, embedding, match_count))
    }

    async fn insert_code_example(&self, example: Record) -> Result<Record> {
        let row = prepare_insert(&tables::CODE_EXAMPLES, example)?;
        self.with_state(|s| s.insert(&tables::CODE_EXAMPLES, row, "insert_code_example"))
    }

    async fn insert_code_examples_batch(&self, examples: Vec<Record>) -> Result<Vec<Record>> {
        insert_batch(self, &tables::CODE_EXAMPLES, examples, "insert_code_examples_batch")
    }

    async fn delete_code_examples_by_source(&self, source_id: &str) -> Result<u64> {
        let select = Select::from(&tables::CODE_EXAMPLES).eq("source_id", source_id);
        self.with_state(|s| s.delete(&select, "delete_code_examples_by_source"))
    }

    async fn delete_code_examples_by_url(&self, url: &str) -> Result<u64> {
        let select = Select::from(&tables::CODE_EXAMPLES).eq("url", url);
        self.with_state(|s| s.delete(&select, "delete_code_examples_by_url"))
    }

    async fn get_code_example_count_by_source(&self, source_id: &str) -> Result<u64> {
        self.with_state(|s| Ok(s.count(&plan::code_examples_by_source(source_id, ListOptions::all()))))
    }

    async fn list_code_examples_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::code_examples_by_source(source_id, options))))
    }
}

#[async_trait]
impl SourceRepository for FakeRepository {
    async fn list_sources(&self, knowledge_type: Option<&str>) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::sources(knowledge_type))))
    }

    async fn get_source_by_id(&self, source_id: &str) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::by_key(&tables::SOURCES, source_id))))
    }

    async fn get_sources_by_ids(&self, source_ids: &[String]) -> Result<Vec<Record>> {
        self.with_state(|s| {
            Ok(source_ids
                .iter()
                .filter_map(|id| s.first(plan::by_key(&tables::SOURCES, id)))
                .collect())
        })
    }

    async fn upsert_source(&self, source: Record) -> Result<Record> {
        let source_id = required_str(&source, tables::SOURCES.name, "source_id")?.to_string();
        self.with_state(|s| s.upsert(plan::by_key(&tables::SOURCES, &source_id), source, "upsert_source"))
    }

    async fn update_source_metadata(&self, source_id: &str, metadata: Record) -> Result<Option<Record>> {
        self.with_state(|s| {
            let Some(existing) = s.first(plan::by_key(&tables::SOURCES, source_id)) else {
                return Ok(None);
            };
            let mut updates = Record::new();
            updates.insert("metadata".to_string(), Value::Object(metadata));
            let row = prepare_update(&tables::SOURCES, &existing, updates)?;
            s.replace(&tables::SOURCES, row, "update_source_metadata").map(Some)
        })
    }

    async fn delete_source(&self, source_id: &str) -> Result<bool> {
        self.with_state(|s| s.cascade(&SOURCE_CASCADE, &tables::SOURCES, source_id, "delete_source"))
    }
}

#[async_trait]
impl CrawledPageRepository for FakeRepository {
    async fn get_crawled_page_by_url(&self, url: &str, source_id: Option<&str>) -> Result<Option<Record>> {
        self.with_state(|s| Ok(s.first(plan::crawled_page(url, source_id))))
    }

    async fn insert_crawled_page(&self, page: Record) -> Result<Record> {
        let row = prepare_insert(&tables::CRAWLED_PAGES, page)?;
        self.with_state(|s| s.insert(&tables::CRAWLED_PAGES, row, "insert_crawled_page"))
    }

    async fn upsert_crawled_page(&self, page: Record) -> Result<Record> {
        let url = required_str(&page, tables::CRAWLED_PAGES.name, "url")?.to_string();
        let source_id = required_str(&page, tables::CRAWLED_PAGES.name, "source_id")?.to_string();
        self.with_state(|s| {
            s.upsert(plan::crawled_page(&url, Some(&source_id)), page, "upsert_crawled_page")
        })
    }

    async fn list_crawled_pages_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        self.with_state(|s| Ok(s.select(&plan::crawled_pages_by_source(source_id, options))))
    }

    async fn get_crawled_page_count_by_source(&self, source_id: &str) -> Result<u64> {
        self.with_state(|s| Ok(s.count(&plan::crawled_pages_by_source(source_id, ListOptions::all()))))
    }

    async fn delete_crawled_pages_by_source(&self, source_id: &str) -> Result<u64> {
        let select = Select::from(&tables::CRAWLED_PAGES).eq("source_id", source_id);
        self.with_state(|s| s.delete(&select, "delete_crawled_pages_by_source"))
    }
}

fn insert_batch(
    repository: &FakeRepository,
    table: &'static crate::schema::TableDefinition,
    records: Vec<Record>,
    operation: &str,
) -> Result<Vec<Record>> {
    let rows = records
        .into_iter()
        .map(|r| prepare_insert(table, r))
        .collect::<Result<Vec<_>>>()?;
    repository.with_state(|s| {
        s.transaction(|s| rows.into_iter().map(|row| s.insert(table, row, operation)).collect())
    })
}
