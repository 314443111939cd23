use super::SqliteRepository;
use super::store;
use crate::Result;
use crate::models::{ListOptions, Record};
use crate::schema::{TableDefinition, tables};
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
impl PageMetadataRepository for SqliteRepository {
    async fn get_page_metadata_by_id(&self, page_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_page_metadata_by_id";
        let select = plan::by_key(&tables::PAGE_METADATA, page_id);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn get_page_metadata_by_url(&self, url: &str) -> Result<Option<Record>> {
        const OP: &str = "get_page_metadata_by_url";
        let select = plan::by(&tables::PAGE_METADATA, "url", url);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn list_pages_by_source(&self, source_id: &str, options: ListOptions) -> Result<Vec<Record>> {
        const OP: &str = "list_pages_by_source";
        let select = plan::pages_by_source(source_id, options);
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }

    async fn get_page_count_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "get_page_count_by_source";
        let select = plan::pages_by_source(source_id, ListOptions::all());
        self.read(OP, move |c| store::count(c, &select, OP)).await
    }

    async fn upsert_page_metadata_batch(&self, pages: Vec<Record>) -> Result<Vec<Record>> {
        const OP: &str = "upsert_page_metadata_batch";
        let keyed = pages
            .into_iter()
            .map(|page| {
                let url = required_str(&page, tables::PAGE_METADATA.name, "url")?.to_string();
                Ok((plan::by(&tables::PAGE_METADATA, "url", &url), page))
            })
            .collect::<Result<Vec<_>>>()?;
        self.write(OP, move |c| {
            keyed
                .into_iter()
                .map(|(existing, page)| store::upsert(c, existing, page, OP))
                .collect()
        })
        .await
    }

    async fn update_page_chunk_count(&self, page_id: &str, chunk_count: i64) -> Result<Option<Record>> {
        const OP: &str = "update_page_chunk_count";
        let mut updates = Record::new();
        updates.insert("chunk_count".to_string(), Value::from(chunk_count));
        let page_id = page_id.to_string();
        self.write(OP, move |c| store::update(c, &tables::PAGE_METADATA, &page_id, updates, OP))
            .await
    }
}

#[async_trait]
impl DocumentRepository for SqliteRepository {
    async fn search_documents_vector(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>> {
        const OP: &str = "search_documents_vector";
        let select = plan::document_search(filter_metadata, true);
        let embedding = embedding.to_vec();
        self.read(OP, move |c| {
            let candidates = store::select(c, &select, OP)?;
            Ok(rank_by_similarity(candidates, &embedding, match_count))
        })
        .await
    }

    async fn search_documents_hybrid(
        &self,
        query_text: &str,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
    ) -> Result<Vec<Record>> {
        const OP: &str = "search_documents_hybrid";
        let select = plan::document_search(filter_metadata, false);
        let embedding = embedding.to_vec();
        let query_text = query_text.to_string();
        self.read(OP, move |c| {
            let candidates = store::select(c, &select, OP)?;
            Ok(hybrid_rank(candidates, &query_text, &embedding, match_count))
        })
        .await
    }

    async fn get_document_by_id(&self, id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_document_by_id";
        let select = plan::by_key(&tables::DOCUMENTS, id);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn insert_document(&self, document: Record) -> Result<Record> {
        const OP: &str = "insert_document";
        let row = prepare_insert(&tables::DOCUMENTS, document)?;
        self.read(OP, move |c| store::insert(c, &tables::DOCUMENTS, row, OP))
            .await
    }

    async fn insert_documents_batch(&self, documents: Vec<Record>) -> Result<Vec<Record>> {
        insert_batch(self, &tables::DOCUMENTS, documents, "insert_documents_batch").await
    }

    async fn delete_documents_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "delete_documents_by_source";
        let select = Select::from(&tables::DOCUMENTS).eq("source_id", source_id);
        self.read(OP, move |c| store::delete(c, &select, OP)).await
    }

    async fn delete_documents_by_url(&self, url: &str) -> Result<u64> {
        const OP: &str = "delete_documents_by_url";
        let select = Select::from(&tables::DOCUMENTS).eq("url", url);
        self.read(OP, move |c| store::delete(c, &select, OP)).await
    }
}

#[async_trait]
impl CodeExampleRepository for SqliteRepository {
    async fn search_code_examples(
        &self,
        embedding: &[f32],
        match_count: usize,
        filter_metadata: Option<&Record>,
        source_id: Option<&str>,
    ) -> Result<Vec<Record>> {
        const OP: &str = "search_code_examples";
        let select = plan::code_example_search(filter_metadata, source_id);
        let embedding = embedding.to_vec();
        self.read(OP, move |c| {
            let candidates = store::select(c, &select, OP)?;
            Ok(rank_by_similarity(candidates, &embedding, match_count))
        })
        .await
    }

    async fn insert_code_example(&self, example: Record) -> Result<Record> {
        const OP: &str = "insert_code_example";
        let row = prepare_insert(&tables::CODE_EXAMPLES, example)?;
        self.read(OP, move |c| store::insert(c, &tables::CODE_EXAMPLES, row, OP))
            .await
    }

    async fn insert_code_examples_batch(&self, examples: Vec<Record>) -> Result<Vec<Record>> {
        insert_batch(self, &tables::CODE_EXAMPLES, examples, "insert_code_examples_batch").await
    }

    async fn delete_code_examples_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "delete_code_examples_by_source";
        let select = Select::from(&tables::CODE_EXAMPLES).eq("source_id", source_id);
        self.read(OP, move |c| store::delete(c, &select, OP)).await
    }

    async fn delete_code_examples_by_url(&self, url: &str) -> Result<u64> {
        const OP: &str = "delete_code_examples_by_url";
        let select = Select::from(&tables::CODE_EXAMPLES).eq("url", url);
        self.read(OP, move |c| store::delete(c, &select, OP)).await
    }

    async fn get_code_example_count_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "get_code_example_count_by_source";
        let select = plan::code_examples_by_source(source_id, ListOptions::all());
        self.read(OP, move |c| store::count(c, &select, OP)).await
    }

    async fn list_code_examples_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        const OP: &str = "list_code_examples_by_source";
        let select = plan::code_examples_by_source(source_id, options);
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }
}

#[async_trait]
impl SourceRepository for SqliteRepository {
    async fn list_sources(&self, knowledge_type: Option<&str>) -> Result<Vec<Record>> {
        const OP: &str = "list_sources";
        let select = plan::sources(knowledge_type);
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }

    async fn get_source_by_id(&self, source_id: &str) -> Result<Option<Record>> {
        const OP: &str = "get_source_by_id";
        let select = plan::by_key(&tables::SOURCES, source_id);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn get_sources_by_ids(&self, source_ids: &[String]) -> Result<Vec<Record>> {
        const OP: &str = "get_sources_by_ids";
        let selects: Vec<Select> = source_ids
            .iter()
            .map(|id| plan::by_key(&tables::SOURCES, id))
            .collect();
        self.read(OP, move |c| {
            let mut found = Vec::with_capacity(selects.len());
            for select in selects {
                if let Some(row) = store::first(c, select, OP)? {
                    found.push(row);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn upsert_source(&self, source: Record) -> Result<Record> {
        const OP: &str = "upsert_source";
        let source_id = required_str(&source, tables::SOURCES.name, "source_id")?;
        let existing = plan::by_key(&tables::SOURCES, source_id);
        self.write(OP, move |c| store::upsert(c, existing, source, OP))
            .await
    }

    async fn update_source_metadata(&self, source_id: &str, metadata: Record) -> Result<Option<Record>> {
        const OP: &str = "update_source_metadata";
        let select = plan::by_key(&tables::SOURCES, source_id);
        self.write(OP, move |c| {
            let Some(existing) = store::first(c, select, OP)? else {
                return Ok(None);
            };
            let mut updates = Record::new();
            updates.insert("metadata".to_string(), Value::Object(metadata));
            let row = prepare_update(&tables::SOURCES, &existing, updates)?;
            store::replace(c, &tables::SOURCES, row, OP).map(Some)
        })
        .await
    }

    async fn delete_source(&self, source_id: &str) -> Result<bool> {
        const OP: &str = "delete_source";
        let source_id = source_id.to_string();
        self.write(OP, move |c| {
            store::cascade(c, &SOURCE_CASCADE, &tables::SOURCES, &source_id, OP)
        })
        .await
    }
}

#[async_trait]
impl CrawledPageRepository for SqliteRepository {
    async fn get_crawled_page_by_url(&self, url: &str, source_id: Option<&str>) -> Result<Option<Record>> {
        const OP: &str = "get_crawled_page_by_url";
        let select = plan::crawled_page(url, source_id);
        self.read(OP, move |c| store::first(c, select, OP)).await
    }

    async fn insert_crawled_page(&self, page: Record) -> Result<Record> {
        const OP: &str = "insert_crawled_page";
        let row = prepare_insert(&tables::CRAWLED_PAGES, page)?;
        self.read(OP, move |c| store::insert(c, &tables::CRAWLED_PAGES, row, OP))
            .await
    }

    async fn upsert_crawled_page(&self, page: Record) -> Result<Record> {
        const OP: &str = "upsert_crawled_page";
        let url = required_str(&page, tables::CRAWLED_PAGES.name, "url")?;
        let source_id = required_str(&page, tables::CRAWLED_PAGES.name, "source_id")?;
        let existing = plan::crawled_page(url, Some(source_id));
        self.write(OP, move |c| store::upsert(c, existing, page, OP))
            .await
    }

    async fn list_crawled_pages_by_source(
        &self,
        source_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        const OP: &str = "list_crawled_pages_by_source";
        let select = plan::crawled_pages_by_source(source_id, options);
        self.read(OP, move |c| store::select(c, &select, OP)).await
    }

    async fn get_crawled_page_count_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "get_crawled_page_count_by_source";
        let select = plan::crawled_pages_by_source(source_id, ListOptions::all());
        self.read(OP, move |c| store::count(c, &select, OP)).await
    }

    async fn delete_crawled_pages_by_source(&self, source_id: &str) -> Result<u64> {
        const OP: &str = "delete_crawled_pages_by_source";
        let select = Select::from(&tables::CRAWLED_PAGES).eq("source_id", source_id);
        self.read(OP, move |c| store::delete(c, &select, OP)).await
    }
}

async fn insert_batch(
    repository: &SqliteRepository,
    table: &'static TableDefinition,
    records: Vec<Record>,
    operation: &'static str,
) -> Result<Vec<Record>> {
    let rows = records
        .into_iter()
        .map(|r| prepare_insert(table, r))
        .collect::<Result<Vec<_>>>()?;
    repository
        .write(operation, move |c| {
            rows.into_iter()
                .map(|row| store::insert(c, table, row, operation))
                .collect()
        })
        .await
}
