//! Behaviour every repository backend must share.
//!
//! Each scenario takes a fresh repository. Backend test files instantiate
//! the whole suite with [`repository_contract!`].

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use archon_dal::models::{ListOptions, MigrationRecord, Record, TaskFilter};
use archon_dal::{DatabaseRepository, ErrorKind};
use serde_json::{Value, json};

/// Builds a record from a JSON object literal.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn id_of(row: &Record) -> String {
    row["id"].as_str().expect("row has a string id").to_string()
}

/// Expands to one `#[tokio::test]` per scenario, each on a fresh repository.
macro_rules! repository_contract {
    ($make:expr) => {
        repository_contract!(@tests $make;
            sources_upsert_and_metadata_merge,
            source_cascade_removes_children,
            document_vector_search,
            document_hybrid_search,
            document_deletes,
            code_example_search_and_listing,
            page_metadata_batch_upsert,
            crawled_pages,
            projects_and_pinning,
            project_cascade,
            tasks_filters_and_counts,
            document_versions_number_themselves,
            project_source_links,
            settings_and_prompts,
            table_counts,
            rpc_passthrough_matches_search,
            migration_bookkeeping,
            absence_is_not_an_error,
        );
    };
    (@tests $make:expr; $($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let repository = $make;
                common::$name(&repository).await;
            }
        )*
    };
}

pub async fn sources_upsert_and_metadata_merge(repo: &dyn DatabaseRepository) {
    let created = repo
        .upsert_source(record(json!({
            "source_id": "docs.rs",
            "title": "Docs",
            "metadata": {"knowledge_type": "technical", "crawl": {"depth": 2}}
        })))
        .await
        .unwrap();
    assert_eq!(created["total_word_count"], 0);

    let merged = repo
        .update_source_metadata("docs.rs", record(json!({"crawl": {"pages": 10}})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged["metadata"]["crawl"], json!({"depth": 2, "pages": 10}));
    assert_eq!(merged["metadata"]["knowledge_type"], "technical");

    let upserted = repo
        .upsert_source(record(json!({
            "source_id": "docs.rs",
            "summary": "Rust docs",
            "metadata": {"tags": ["rust"]}
        })))
        .await
        .unwrap();
    assert_eq!(upserted["title"], "Docs");
    assert_eq!(upserted["summary"], "Rust docs");
    assert_eq!(upserted["metadata"]["crawl"]["depth"], 2);
    assert_eq!(upserted["metadata"]["tags"], json!(["rust"]));

    repo.upsert_source(record(json!({
        "source_id": "blog",
        "metadata": {"knowledge_type": "business"}
    })))
    .await
    .unwrap();

    assert_eq!(repo.list_sources(None).await.unwrap().len(), 2);
    let technical = repo.list_sources(Some("technical")).await.unwrap();
    assert_eq!(technical.len(), 1);
    assert_eq!(technical[0]["source_id"], "docs.rs");

    let ids = vec!["blog".to_string(), "missing".to_string(), "docs.rs".to_string()];
    let found = repo.get_sources_by_ids(&ids).await.unwrap();
    assert_eq!(found.len(), 2);

    assert!(
        repo.update_source_metadata("missing", Record::new())
            .await
            .unwrap()
            .is_none()
    );
}

pub async fn source_cascade_removes_children(repo: &dyn DatabaseRepository) {
    for source_id in ["s1", "s2"] {
        repo.upsert_source(record(json!({"source_id": source_id})))
            .await
            .unwrap();
        repo.insert_document(record(json!({
            "url": format!("https://{source_id}/a"),
            "content": "alpha",
            "source_id": source_id
        })))
        .await
        .unwrap();
        repo.insert_code_example(record(json!({
            "url": format!("https://{source_id}/a"),
            "content": "fn main() {}",
            "source_id": source_id
        })))
        .await
        .unwrap();
        repo.insert_crawled_page(record(json!({
            "url": format!("https://{source_id}/a"),
            "source_id": source_id,
            "content": "<html>"
        })))
        .await
        .unwrap();
        repo.upsert_page_metadata_batch(vec![record(json!({
            "url": format!("https://{source_id}/a"),
            "source_id": source_id
        }))])
        .await
        .unwrap();
    }
    let project = repo
        .create_project(record(json!({"title": "p"})))
        .await
        .unwrap();
    repo.link_project_source(&id_of(&project), "s1", None, "tester")
        .await
        .unwrap();

    assert!(repo.delete_source("s1").await.unwrap());
    assert!(repo.get_source_by_id("s1").await.unwrap().is_none());
    assert_eq!(repo.get_page_count_by_source("s1").await.unwrap(), 0);
    assert_eq!(repo.get_code_example_count_by_source("s1").await.unwrap(), 0);
    assert_eq!(repo.get_crawled_page_count_by_source("s1").await.unwrap(), 0);
    assert!(
        repo.list_project_sources(&id_of(&project))
            .await
            .unwrap()
            .is_empty()
    );
    let filters = record(json!({"source_id": "s1"}));
    assert_eq!(repo.get_table_count("documents", &filters).await.unwrap(), 0);

    assert_eq!(repo.get_page_count_by_source("s2").await.unwrap(), 1);
    let filters = record(json!({"source_id": "s2"}));
    assert_eq!(repo.get_table_count("documents", &filters).await.unwrap(), 1);

    assert!(!repo.delete_source("s1").await.unwrap());
}

fn chunk(url: &str, n: i64, content: &str, embedding: Option<[f32; 3]>, meta: Value) -> Record {
    let mut row = record(json!({
        "url": url,
        "chunk_number": n,
        "content": content,
        "source_id": "src",
        "metadata": meta
    }));
    if let Some(embedding) = embedding {
        row.insert("embedding".to_string(), json!(embedding));
    }
    row
}

pub async fn document_vector_search(repo: &dyn DatabaseRepository) {
    let inserted = repo
        .insert_documents_batch(vec![
            chunk("u1", 0, "exact", Some([1.0, 0.0, 0.0]), json!({"lang": "en"})),
            chunk("u1", 1, "close", Some([0.9, 0.1, 0.0]), json!({"lang": "de"})),
            chunk("u2", 0, "orthogonal", Some([0.0, 1.0, 0.0]), json!({"lang": "en"})),
            chunk("u3", 0, "no vector", None, json!({"lang": "en"})),
        ])
        .await
        .unwrap();
    assert_eq!(inserted.len(), 4);
    assert!(inserted.iter().all(|r| r["id"].is_string()));
    assert_eq!(inserted[1]["content"], "close");

    let results = repo
        .search_documents_vector(&[1.0, 0.0, 0.0], 2, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["content"], "exact");
    assert_eq!(results[1]["content"], "close");
    let top = results[0]["similarity"].as_f64().unwrap();
    assert!((top - 1.0).abs() < 1e-5);
    assert!(results.iter().all(|r| !r.contains_key("embedding")));

    let english = repo
        .search_documents_vector(&[1.0, 0.0, 0.0], 10, Some(&record(json!({"lang": "en"}))))
        .await
        .unwrap();
    let contents: Vec<_> = english.iter().map(|r| r["content"].clone()).collect();
    assert_eq!(contents, vec![json!("exact"), json!("orthogonal")]);
}

pub async fn document_hybrid_search(repo: &dyn DatabaseRepository) {
    repo.insert_documents_batch(vec![
        chunk("u1", 0, "tokio runtime internals", Some([1.0, 0.0, 0.0]), json!({})),
        chunk("u2", 0, "serde derive macros", Some([1.0, 0.0, 0.0]), json!({})),
        chunk("u3", 0, "tokio tutorial", None, json!({})),
        chunk("u4", 0, "unrelated", Some([0.0, 1.0, 0.0]), json!({})),
    ])
    .await
    .unwrap();

    let results = repo
        .search_documents_hybrid("tokio", &[1.0, 0.0, 0.0], 10, None)
        .await
        .unwrap();
    let by_content = |c: &str| {
        results
            .iter()
            .find(|r| r["content"] == c)
            .unwrap_or_else(|| panic!("{c} missing"))
    };
    assert_eq!(results[0]["content"], "tokio runtime internals");
    assert_eq!(by_content("tokio runtime internals")["match_type"], "hybrid");
    assert_eq!(by_content("serde derive macros")["match_type"], "vector");
    assert_eq!(by_content("tokio tutorial")["match_type"], "keyword");
    assert!(results.iter().all(|r| r["content"] != "unrelated"));
    assert!(results.iter().all(|r| !r.contains_key("embedding")));
}

pub async fn document_deletes(repo: &dyn DatabaseRepository) {
    let doc = repo
        .insert_document(chunk("u1", 0, "a", None, json!({})))
        .await
        .unwrap();
    repo.insert_document(chunk("u1", 1, "b", None, json!({})))
        .await
        .unwrap();
    repo.insert_document(chunk("u2", 0, "c", None, json!({})))
        .await
        .unwrap();

    let fetched = repo.get_document_by_id(&id_of(&doc)).await.unwrap().unwrap();
    assert_eq!(fetched["content"], "a");

    assert_eq!(repo.delete_documents_by_url("u1").await.unwrap(), 2);
    assert_eq!(repo.delete_documents_by_url("u1").await.unwrap(), 0);
    assert_eq!(repo.delete_documents_by_source("src").await.unwrap(), 1);
    assert!(repo.get_document_by_id(&id_of(&doc)).await.unwrap().is_none());

    let err = repo
        .insert_document(record(json!({"url": "u", "source_id": "src"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

pub async fn code_example_search_and_listing(repo: &dyn DatabaseRepository) {
    let examples = vec![
        record(json!({"url": "b", "chunk_number": 1, "content": "b1", "source_id": "s1", "embedding": [1.0, 0.0]})),
        record(json!({"url": "a", "chunk_number": 0, "content": "a0", "source_id": "s1", "embedding": [0.0, 1.0]})),
        record(json!({"url": "b", "chunk_number": 0, "content": "b0", "source_id": "s1", "summary": "s"})),
        record(json!({"url": "c", "chunk_number": 0, "content": "c0", "source_id": "s2", "embedding": [1.0, 0.0]})),
    ];
    let inserted = repo.insert_code_examples_batch(examples).await.unwrap();
    assert_eq!(inserted.len(), 4);

    assert_eq!(repo.get_code_example_count_by_source("s1").await.unwrap(), 3);

    let listed = repo
        .list_code_examples_by_source("s1", ListOptions::default())
        .await
        .unwrap();
    let order: Vec<_> = listed.iter().map(|r| r["content"].clone()).collect();
    assert_eq!(order, vec![json!("a0"), json!("b0"), json!("b1")]);

    let page = repo
        .list_code_examples_by_source("s1", ListOptions::default().with_limit(1).with_offset(1))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["content"], "b0");

    let hits = repo
        .search_code_examples(&[1.0, 0.0], 10, None, Some("s1"))
        .await
        .unwrap();
    let contents: Vec<_> = hits.iter().map(|r| r["content"].clone()).collect();
    assert_eq!(contents, vec![json!("b1"), json!("a0")]);

    let everywhere = repo.search_code_examples(&[1.0, 0.0], 10, None, None).await.unwrap();
    assert_eq!(everywhere.len(), 3);

    assert_eq!(repo.delete_code_examples_by_url("b").await.unwrap(), 2);
    assert_eq!(repo.delete_code_examples_by_source("s2").await.unwrap(), 1);
    assert_eq!(repo.get_code_example_count_by_source("s1").await.unwrap(), 1);
}

pub async fn page_metadata_batch_upsert(repo: &dyn DatabaseRepository) {
    let first = repo
        .upsert_page_metadata_batch(vec![
            record(json!({"url": "https://x/b", "source_id": "x", "word_count": 10, "metadata": {"a": 1}})),
            record(json!({"url": "https://x/a", "source_id": "x", "word_count": 5})),
        ])
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["url"], "https://x/b");

    let second = repo
        .upsert_page_metadata_batch(vec![record(json!({
            "url": "https://x/b",
            "source_id": "x",
            "word_count": 12,
            "metadata": {"b": 2}
        }))])
        .await
        .unwrap();
    assert_eq!(second[0]["id"], first[0]["id"]);
    assert_eq!(second[0]["word_count"], 12);
    assert_eq!(second[0]["metadata"], json!({"a": 1, "b": 2}));
    assert_eq!(repo.get_page_count_by_source("x").await.unwrap(), 2);

    let listed = repo
        .list_pages_by_source("x", ListOptions::default())
        .await
        .unwrap();
    assert_eq!(listed[0]["url"], "https://x/a");

    let page_id = id_of(&first[0]);
    let updated = repo
        .update_page_chunk_count(&page_id, 7)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["chunk_count"], 7);
    let by_url = repo
        .get_page_metadata_by_url("https://x/b")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_url["chunk_count"], 7);
    assert!(repo.get_page_metadata_by_id(&page_id).await.unwrap().is_some());
    assert!(
        repo.update_page_chunk_count("missing", 1)
            .await
            .unwrap()
            .is_none()
    );
}

pub async fn crawled_pages(repo: &dyn DatabaseRepository) {
    let page = record(json!({
        "url": "https://x/a",
        "source_id": "x",
        "content": "v1",
        "metadata": {"etag": "1"}
    }));
    let created = repo.insert_crawled_page(page.clone()).await.unwrap();
    let err = repo.insert_crawled_page(page).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

    repo.insert_crawled_page(record(json!({"url": "https://x/a", "source_id": "y"})))
        .await
        .unwrap();

    let merged = repo
        .upsert_crawled_page(record(json!({
            "url": "https://x/a",
            "source_id": "x",
            "content": "v2",
            "metadata": {"status": "fresh"}
        })))
        .await
        .unwrap();
    assert_eq!(merged["id"], created["id"]);
    assert_eq!(merged["content"], "v2");
    assert_eq!(merged["metadata"], json!({"etag": "1", "status": "fresh"}));

    let scoped = repo
        .get_crawled_page_by_url("https://x/a", Some("y"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scoped["source_id"], "y");
    assert!(
        repo.get_crawled_page_by_url("https://x/a", None)
            .await
            .unwrap()
            .is_some()
    );

    repo.upsert_crawled_page(record(json!({"url": "https://x/0", "source_id": "x"})))
        .await
        .unwrap();
    let listed = repo
        .list_crawled_pages_by_source("x", ListOptions::default())
        .await
        .unwrap();
    let urls: Vec<_> = listed.iter().map(|r| r["url"].clone()).collect();
    assert_eq!(urls, vec![json!("https://x/0"), json!("https://x/a")]);

    assert_eq!(repo.delete_crawled_pages_by_source("x").await.unwrap(), 2);
    assert_eq!(repo.get_crawled_page_count_by_source("x").await.unwrap(), 0);
    assert_eq!(repo.get_crawled_page_count_by_source("y").await.unwrap(), 1);
}

pub async fn projects_and_pinning(repo: &dyn DatabaseRepository) {
    let a = repo
        .create_project(record(json!({
            "title": "A",
            "pinned": true,
            "features": [{"name": "search"}],
            "docs": [{"id": "d"}]
        })))
        .await
        .unwrap();
    let b = repo
        .create_project(record(json!({"title": "B", "pinned": true})))
        .await
        .unwrap();
    let c = repo
        .create_project(record(json!({"title": "C"})))
        .await
        .unwrap();
    assert_eq!(c["pinned"], false);
    assert_eq!(c["docs"], json!([]));

    let slim = repo.list_projects(false).await.unwrap();
    assert_eq!(slim.len(), 3);
    assert!(slim.iter().all(|p| !p.contains_key("docs") && !p.contains_key("features")));
    let full = repo.list_projects(true).await.unwrap();
    assert!(full.iter().all(|p| p.contains_key("docs")));

    let features = repo.get_project_features(&id_of(&a)).await.unwrap().unwrap();
    assert_eq!(features, vec![json!({"name": "search"})]);
    assert!(repo.get_project_features("missing").await.unwrap().is_none());

    assert_eq!(repo.unpin_all_projects_except(&id_of(&b)).await.unwrap(), 1);
    let a_now = repo.get_project_by_id(&id_of(&a)).await.unwrap().unwrap();
    let b_now = repo.get_project_by_id(&id_of(&b)).await.unwrap().unwrap();
    assert_eq!(a_now["pinned"], false);
    assert_eq!(b_now["pinned"], true);

    let updated = repo
        .update_project(&id_of(&c), record(json!({"description": "third", "id": "ignored"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["id"], c["id"]);
    assert_eq!(updated["description"], "third");
    assert_eq!(updated["created_at"], c["created_at"]);
    assert!(
        repo.update_project("missing", record(json!({"title": "x"})))
            .await
            .unwrap()
            .is_none()
    );

    let err = repo
        .create_project(record(json!({"id": id_of(&a), "title": "dup"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

pub async fn project_cascade(repo: &dyn DatabaseRepository) {
    let project = repo
        .create_project(record(json!({"title": "P"})))
        .await
        .unwrap();
    let other = repo
        .create_project(record(json!({"title": "Q"})))
        .await
        .unwrap();
    let pid = id_of(&project);
    for p in [&pid, &id_of(&other)] {
        repo.create_task(record(json!({"title": "t", "project_id": p})))
            .await
            .unwrap();
        repo.create_document_version(record(json!({
            "project_id": p,
            "field_name": "docs",
            "content": {"v": 1}
        })))
        .await
        .unwrap();
        repo.link_project_source(p, "src", Some("n"), "tester")
            .await
            .unwrap();
    }

    assert!(repo.delete_project(&pid).await.unwrap());
    assert!(repo.get_project_by_id(&pid).await.unwrap().is_none());
    assert!(
        repo.list_tasks(&TaskFilter::new().with_project(pid.as_str()))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(repo.list_document_versions(&pid, None).await.unwrap().is_empty());
    assert_eq!(repo.list_projects_for_source("src").await.unwrap().len(), 1);
    assert_eq!(
        repo.list_tasks(&TaskFilter::new().with_project(id_of(&other)))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(!repo.delete_project(&pid).await.unwrap());
}

pub async fn tasks_filters_and_counts(repo: &dyn DatabaseRepository) {
    let project = id_of(
        &repo
            .create_project(record(json!({"title": "P"})))
            .await
            .unwrap(),
    );
    let make = |title: &str, status: &str, order: i64| {
        record(json!({
            "title": title,
            "status": status,
            "task_order": order,
            "project_id": project,
            "sources": [{"url": "u"}]
        }))
    };
    let t1 = repo.create_task(make("t1", "todo", 2)).await.unwrap();
    repo.create_task(make("t2", "todo", 1)).await.unwrap();
    repo.create_task(make("t3", "doing", 0)).await.unwrap();
    let t4 = repo.create_task(make("t4", "done", 0)).await.unwrap();
    repo.create_task(record(json!({"title": "loose"}))).await.unwrap();
    assert_eq!(t1["assignee"], "User");
    assert_eq!(t1["archived"], false);

    let todos = repo
        .get_tasks_by_project_and_status(&project, "todo")
        .await
        .unwrap();
    let titles: Vec<_> = todos.iter().map(|t| t["title"].clone()).collect();
    assert_eq!(titles, vec![json!("t2"), json!("t1")]);

    let slim = repo
        .list_tasks(&TaskFilter {
            exclude_large_fields: true,
            ..TaskFilter::new().with_project(project.as_str())
        })
        .await
        .unwrap();
    assert_eq!(slim.len(), 4);
    assert!(slim.iter().all(|t| !t.contains_key("sources")));

    let archived = repo
        .archive_task(&id_of(&t4), "reviewer")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(archived["archived"], true);
    assert_eq!(archived["archived_by"], "reviewer");
    assert!(archived["archived_at"].is_string());

    let counts = repo.get_task_counts_by_project(&project).await.unwrap();
    assert_eq!((counts.todo, counts.doing, counts.review, counts.done), (2, 1, 0, 0));

    let with_archived = repo
        .list_tasks(&TaskFilter {
            include_archived: true,
            ..TaskFilter::new().with_project(project.as_str())
        })
        .await
        .unwrap();
    assert_eq!(with_archived.len(), 4);

    let all = repo.get_all_project_task_counts().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&project].todo, 2);

    let moved = repo
        .update_task(&id_of(&t1), record(json!({"status": "review"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved["status"], "review");
    assert_eq!(repo.get_task_counts_by_project(&project).await.unwrap().review, 1);

    assert!(repo.delete_task(&id_of(&t1)).await.unwrap());
    assert!(!repo.delete_task(&id_of(&t1)).await.unwrap());
    assert!(repo.archive_task("missing", "x").await.unwrap().is_none());
}

pub async fn document_versions_number_themselves(repo: &dyn DatabaseRepository) {
    let project = id_of(
        &repo
            .create_project(record(json!({"title": "P"})))
            .await
            .unwrap(),
    );
    let version = |field: &str, v: i64| {
        record(json!({
            "project_id": project,
            "field_name": field,
            "content": {"v": v}
        }))
    };
    let v1 = repo.create_document_version(version("docs", 1)).await.unwrap();
    let v2 = repo.create_document_version(version("docs", 2)).await.unwrap();
    let f1 = repo.create_document_version(version("features", 1)).await.unwrap();
    assert_eq!(v1["version_number"], 1);
    assert_eq!(v2["version_number"], 2);
    assert_eq!(f1["version_number"], 1);
    assert_eq!(v1["change_type"], "update");
    assert_eq!(v1["created_by"], "system");

    let latest = repo
        .get_latest_document_version(&project, "docs")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest["content"], json!({"v": 2}));

    let docs = repo
        .list_document_versions(&project, Some("docs"))
        .await
        .unwrap();
    let numbers: Vec<_> = docs.iter().map(|r| r["version_number"].clone()).collect();
    assert_eq!(numbers, vec![json!(2), json!(1)]);
    assert_eq!(repo.list_document_versions(&project, None).await.unwrap().len(), 3);

    assert!(repo.delete_document_version(&id_of(&v2)).await.unwrap());
    assert!(repo.get_document_version_by_id(&id_of(&v2)).await.unwrap().is_none());
    let latest = repo
        .get_latest_document_version(&project, "docs")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest["version_number"], 1);
}

pub async fn project_source_links(repo: &dyn DatabaseRepository) {
    let project = id_of(
        &repo
            .create_project(record(json!({"title": "P"})))
            .await
            .unwrap(),
    );
    let first = repo
        .link_project_source(&project, "docs.rs", Some("reference"), "alice")
        .await
        .unwrap();
    let again = repo
        .link_project_source(&project, "docs.rs", None, "bob")
        .await
        .unwrap();
    assert_eq!(first["id"], again["id"]);
    assert_eq!(again["created_by"], "alice");
    assert_eq!(again["notes"], "reference");

    repo.link_project_source(&project, "blog", None, "alice")
        .await
        .unwrap();
    assert_eq!(repo.list_project_sources(&project).await.unwrap().len(), 2);
    assert_eq!(repo.list_projects_for_source("docs.rs").await.unwrap().len(), 1);

    assert!(repo.unlink_project_source(&project, "docs.rs").await.unwrap());
    assert!(!repo.unlink_project_source(&project, "docs.rs").await.unwrap());
    assert!(repo.list_projects_for_source("docs.rs").await.unwrap().is_empty());
}

pub async fn settings_and_prompts(repo: &dyn DatabaseRepository) {
    repo.upsert_setting(record(json!({"key": "b", "value": "2", "category": "rag"})))
        .await
        .unwrap();
    let a = repo
        .upsert_setting(record(json!({"key": "a", "value": "1", "category": "rag"})))
        .await
        .unwrap();
    repo.upsert_setting(record(json!({"key": "c", "value": "3", "category": "ui"})))
        .await
        .unwrap();
    assert_eq!(a["is_encrypted"], false);

    let again = repo
        .upsert_setting(record(json!({"key": "a", "value": "one"})))
        .await
        .unwrap();
    assert_eq!(again["id"], a["id"]);
    assert_eq!(again["category"], "rag");

    let rag = repo.get_settings_by_category("rag").await.unwrap();
    let keys: Vec<_> = rag.iter().map(|s| s["key"].clone()).collect();
    assert_eq!(keys, vec![json!("a"), json!("b")]);
    assert_eq!(repo.get_all_settings().await.unwrap().len(), 3);
    assert_eq!(repo.get_setting("a").await.unwrap().unwrap()["value"], "one");
    assert!(repo.delete_setting("a").await.unwrap());
    assert!(!repo.delete_setting("a").await.unwrap());

    let err = repo
        .upsert_setting(record(json!({"value": "no key"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    repo.upsert_prompt(record(json!({"prompt_name": "summary", "prompt": "Summarize"})))
        .await
        .unwrap();
    repo.upsert_prompt(record(json!({"prompt_name": "answer", "prompt": "Answer"})))
        .await
        .unwrap();
    let updated = repo
        .upsert_prompt(record(json!({"prompt_name": "summary", "prompt": "Summarize briefly"})))
        .await
        .unwrap();
    assert_eq!(updated["prompt"], "Summarize briefly");
    let names: Vec<_> = repo
        .list_prompts()
        .await
        .unwrap()
        .iter()
        .map(|p| p["prompt_name"].clone())
        .collect();
    assert_eq!(names, vec![json!("answer"), json!("summary")]);
    assert!(repo.delete_prompt("answer").await.unwrap());
    assert!(repo.get_prompt_by_name("answer").await.unwrap().is_none());
}

pub async fn table_counts(repo: &dyn DatabaseRepository) {
    repo.create_task(record(json!({"title": "a", "status": "done"})))
        .await
        .unwrap();
    repo.create_task(record(json!({"title": "b"}))).await.unwrap();
    repo.create_task(record(json!({"title": "c"}))).await.unwrap();

    assert_eq!(repo.get_table_count("tasks", &Record::new()).await.unwrap(), 3);
    let todo = record(json!({"status": "todo"}));
    assert_eq!(repo.get_table_count("tasks", &todo).await.unwrap(), 2);
    let none = record(json!({"status": "todo", "archived": true}));
    assert_eq!(repo.get_table_count("tasks", &none).await.unwrap(), 0);

    let err = repo
        .get_table_count("users; DROP TABLE tasks", &Record::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = repo
        .get_table_count("tasks", &record(json!({"nope": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

pub async fn rpc_passthrough_matches_search(repo: &dyn DatabaseRepository) {
    repo.insert_documents_batch(vec![
        chunk("u1", 0, "rust async", Some([1.0, 0.0, 0.0]), json!({"lang": "en"})),
        chunk("u2", 0, "python", Some([0.0, 1.0, 0.0]), json!({"lang": "en"})),
    ])
    .await
    .unwrap();

    let direct = repo
        .search_documents_vector(&[1.0, 0.0, 0.0], 1, None)
        .await
        .unwrap();
    let via_rpc = repo
        .execute_rpc(
            "match_documents",
            json!({"query_embedding": [1.0, 0.0, 0.0], "match_count": 1}),
        )
        .await
        .unwrap();
    assert_eq!(via_rpc, Value::Array(direct.into_iter().map(Value::Object).collect()));

    let hybrid = repo
        .execute_rpc(
            "hybrid_search",
            json!({"query_text": "rust", "query_embedding": [1.0, 0.0, 0.0], "match_count": 5}),
        )
        .await
        .unwrap();
    assert_eq!(hybrid[0]["content"], "rust async");
    assert_eq!(hybrid[0]["match_type"], "hybrid");

    let err = repo
        .execute_rpc("hybrid_search", json!({"query_embedding": [1.0]}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = repo.execute_rpc("get_stats", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

pub async fn migration_bookkeeping(repo: &dyn DatabaseRepository) {
    let before = repo.get_applied_migrations().await.unwrap().len();
    assert!(!repo.is_migration_applied("900").await.unwrap());

    let recorded = repo
        .record_migration(MigrationRecord::new("900", "900_extra", "abc", "tester"))
        .await
        .unwrap();
    assert_eq!(recorded.version, "900");
    assert!(repo.is_migration_applied("900").await.unwrap());

    let applied = repo.get_applied_migrations().await.unwrap();
    assert_eq!(applied.len(), before + 1);
    assert_eq!(applied.last().unwrap().version, "900");

    let err = repo
        .record_migration(MigrationRecord::new("900", "900_extra", "abc", "tester"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

pub async fn absence_is_not_an_error(repo: &dyn DatabaseRepository) {
    assert!(repo.get_source_by_id("x").await.unwrap().is_none());
    assert!(repo.get_document_by_id("x").await.unwrap().is_none());
    assert!(repo.get_page_metadata_by_id("x").await.unwrap().is_none());
    assert!(repo.get_page_metadata_by_url("x").await.unwrap().is_none());
    assert!(repo.get_crawled_page_by_url("x", None).await.unwrap().is_none());
    assert!(repo.get_project_by_id("x").await.unwrap().is_none());
    assert!(repo.get_task_by_id("x").await.unwrap().is_none());
    assert!(repo.get_document_version_by_id("x").await.unwrap().is_none());
    assert!(repo.get_latest_document_version("x", "docs").await.unwrap().is_none());
    assert!(repo.get_setting("x").await.unwrap().is_none());
    assert!(repo.get_prompt_by_name("x").await.unwrap().is_none());
    assert!(!repo.delete_source("x").await.unwrap());
    assert!(!repo.delete_project("x").await.unwrap());
    assert!(!repo.delete_prompt("x").await.unwrap());
    assert!(repo.update_task("x", Record::new()).await.unwrap().is_none());
    assert!(repo.list_sources(None).await.unwrap().is_empty());
    assert!(repo.search_documents_vector(&[1.0], 5, None).await.unwrap().is_empty());
    assert_eq!(repo.get_page_count_by_source("x").await.unwrap(), 0);
    assert!(repo.get_all_project_task_counts().await.unwrap().is_empty());
}
