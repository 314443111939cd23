//! Property-based tests for backend-independent record handling.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Metadata merges keep keys the caller did not mention
//! - Cosine similarity stays bounded and guards zero vectors
//! - List windows are contiguous slices of the ordered rows
//! - Migration scripts split on statement boundaries only

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use archon_dal::ListOptions;
use archon_dal::models::Record;
use archon_dal::storage::merge::{deep_merge, merge_record};
use archon_dal::storage::similarity::cosine_similarity;
use archon_dal::storage::sqlite::migrations::split_statements;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn flat_object() -> impl Strategy<Value = BTreeMap<String, i64>> {
    prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..8)
}

fn to_value(map: &BTreeMap<String, i64>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), json!(v))).collect())
}

fn non_zero_vector(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, len)
        .prop_filter("non-zero magnitude", |v| v.iter().any(|x| x.abs() > 1e-3))
}

proptest! {
    /// Property: every key of base or patch is present after a merge, and
    /// patch values win.
    #[test]
    fn prop_deep_merge_unions_keys(base in flat_object(), patch in flat_object()) {
        let mut merged = to_value(&base);
        deep_merge(&mut merged, to_value(&patch));
        let merged = merged.as_object().unwrap();

        for (key, value) in &base {
            let expected = patch.get(key).unwrap_or(value);
            prop_assert_eq!(&merged[key], &json!(expected));
        }
        for (key, value) in &patch {
            prop_assert_eq!(&merged[key], &json!(value));
        }
        prop_assert!(merged.len() <= base.len() + patch.len());
    }

    /// Property: applying the same patch twice is the same as once.
    #[test]
    fn prop_deep_merge_is_idempotent(base in flat_object(), patch in flat_object()) {
        let mut once = json!({"nested": to_value(&base)});
        deep_merge(&mut once, json!({"nested": to_value(&patch)}));
        let mut twice = once.clone();
        deep_merge(&mut twice, json!({"nested": to_value(&patch)}));
        prop_assert_eq!(once, twice);
    }

    /// Property: only `metadata` is merged; other columns are replaced.
    #[test]
    fn prop_merge_record_keeps_existing_metadata(
        existing_meta in flat_object(),
        incoming_meta in flat_object(),
        old_title in "[a-z]{1,8}",
        new_title in "[a-z]{1,8}",
    ) {
        let mut existing = Record::new();
        existing.insert("title".to_string(), json!(old_title));
        existing.insert("metadata".to_string(), to_value(&existing_meta));
        let mut incoming = Record::new();
        incoming.insert("title".to_string(), json!(new_title.clone()));
        incoming.insert("metadata".to_string(), to_value(&incoming_meta));

        let merged = merge_record(&existing, incoming);
        prop_assert_eq!(&merged["title"], &json!(new_title));
        let metadata = merged["metadata"].as_object().unwrap();
        for key in existing_meta.keys().chain(incoming_meta.keys()) {
            prop_assert!(metadata.contains_key(key));
        }
    }

    /// Property: similarity of non-zero vectors lies in [-1, 1].
    #[test]
    fn prop_cosine_similarity_is_bounded(
        (a, b) in (1usize..16).prop_flat_map(|n| (non_zero_vector(n), non_zero_vector(n)))
    ) {
        let s = cosine_similarity(&a, &b);
        prop_assert!(s.is_finite());
        prop_assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&s), "similarity {s}");
        prop_assert!((s - cosine_similarity(&b, &a)).abs() < 1e-5);
    }

    /// Property: a non-zero vector is maximally similar to itself.
    #[test]
    fn prop_cosine_self_similarity_is_one(v in (1usize..16).prop_flat_map(non_zero_vector)) {
        prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    /// Property: zero vectors and mismatched lengths score 0.
    #[test]
    fn prop_cosine_degenerate_inputs_score_zero(v in (1usize..16).prop_flat_map(non_zero_vector)) {
        let zero = vec![0.0f32; v.len()];
        prop_assert_eq!(cosine_similarity(&v, &zero), 0.0);
        let mut longer = v.clone();
        longer.push(1.0);
        prop_assert_eq!(cosine_similarity(&v, &longer), 0.0);
    }

    /// Property: a window is the contiguous slice `[offset, offset + limit)`.
    #[test]
    fn prop_list_window_is_contiguous(
        len in 0usize..50,
        offset in 0usize..60,
        limit in prop::option::of(0usize..60),
    ) {
        let rows: Vec<usize> = (0..len).collect();
        let options = ListOptions { limit, offset };
        let window = options.apply(rows);

        let available = len.saturating_sub(offset);
        let expected_len = limit.map_or(available, |l| l.min(available));
        prop_assert_eq!(window.len(), expected_len);
        for (i, row) in window.iter().enumerate() {
            prop_assert_eq!(*row, offset + i);
        }
    }

    /// Property: `ListOptions::all` never drops rows.
    #[test]
    fn prop_list_all_is_identity(len in 0usize..100) {
        let rows: Vec<usize> = (0..len).collect();
        prop_assert_eq!(ListOptions::all().apply(rows.clone()), rows);
    }

    /// Property: one statement per `;`-terminated input statement.
    #[test]
    fn prop_split_statements_counts(
        names in prop::collection::vec("[a-z]{1,10}", 1..10),
    ) {
        let script: String = names
            .iter()
            .map(|n| format!("CREATE TABLE {n} (id TEXT);\n"))
            .collect();
        let statements = split_statements(&script);
        prop_assert_eq!(statements.len(), names.len());
        for (statement, name) in statements.iter().zip(&names) {
            prop_assert_eq!(statement, &format!("CREATE TABLE {name} (id TEXT)"));
        }
    }

    /// Property: semicolons inside string literals do not split.
    #[test]
    fn prop_split_statements_respects_literals(text in "[a-z; ]{0,20}") {
        let script = format!("INSERT INTO t VALUES ('{text}');\n-- trailing; comment\n");
        let statements = split_statements(&script);
        prop_assert_eq!(statements.len(), 1);
        prop_assert_eq!(&statements[0], &format!("INSERT INTO t VALUES ('{text}')"));
    }
}
