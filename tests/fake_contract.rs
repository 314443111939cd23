//! Repository behaviour against the in-memory backend.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::wildcard_imports)]

#[macro_use]
mod common;

use archon_dal::storage::FakeRepository;
use archon_dal::storage::traits::*;
use archon_dal::{ErrorKind, Record};
use common::record;
use serde_json::json;

repository_contract!(FakeRepository::new());

#[tokio::test]
async fn failed_cascade_step_keeps_every_row() {
    let repo = FakeRepository::new();
    let project = repo
        .create_project(record(json!({"title": "P"})))
        .await
        .unwrap();
    let pid = project["id"].as_str().unwrap();
    repo.create_task(record(json!({"title": "t", "project_id": pid})))
        .await
        .unwrap();
    repo.link_project_source(pid, "src", None, "tester")
        .await
        .unwrap();
    repo.fail_writes_to("project_sources");

    let err = repo.delete_project(pid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert!(repo.get_project_by_id(pid).await.unwrap().is_some());
    assert_eq!(repo.get_table_count("tasks", &Record::new()).await.unwrap(), 1);

    repo.clear_failures();
    assert!(repo.delete_project(pid).await.unwrap());
}

#[tokio::test]
async fn returned_rows_are_detached_copies() {
    let repo = FakeRepository::new();
    let mut source = repo
        .upsert_source(record(json!({"source_id": "s", "title": "before"})))
        .await
        .unwrap();
    source.insert("title".to_string(), json!("mutated"));
    let stored = repo.get_source_by_id("s").await.unwrap().unwrap();
    assert_eq!(stored["title"], "before");
}

#[tokio::test]
async fn concurrent_writers_serialize() {
    let repo = std::sync::Arc::new(FakeRepository::new());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = std::sync::Arc::clone(&repo);
            tokio::spawn(async move {
                repo.upsert_setting(record(json!({"key": format!("k{i}"), "value": "v"})))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(repo.get_all_settings().await.unwrap().len(), 16);
}
