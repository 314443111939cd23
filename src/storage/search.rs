//! Application-side search ranking.
//!
//! Used by backends without native vector operators. The Supabase backend
//! gets the same results from its server-side functions.

use super::similarity::{cosine_similarity, parse_embedding};
use crate::models::Record;
use serde_json::Value;

/// Column holding embeddings.
pub const EMBEDDING_COLUMN: &str = "embedding";
/// Column holding searchable text.
pub const CONTENT_COLUMN: &str = "content";
/// Score field added to search results.
pub const SIMILARITY_FIELD: &str = "similarity";
/// Match provenance field added to hybrid results.
pub const MATCH_TYPE_FIELD: &str = "match_type";

/// Weight of the vector score in hybrid ranking.
const VECTOR_WEIGHT: f32 = 0.5;
/// Weight of the keyword score in hybrid ranking.
const KEYWORD_WEIGHT: f32 = 0.5;

/// JSON containment with PostgreSQL `@>` semantics.
///
/// Objects contain objects whose every key is contained; arrays contain
/// arrays whose every element is contained by some element; scalars contain
/// equal scalars.
///
/// # Examples
///
/// ```
/// use archon_dal::storage::search::json_contains;
/// use serde_json::json;
///
/// assert!(json_contains(&json!({"a": 1, "b": [1, 2]}), &json!({"b": [2]})));
/// assert!(!json_contains(&json!({"a": 1}), &json!({"a": 2})));
/// ```
#[must_use]
pub fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(key, nv)| h.get(key).is_some_and(|hv| json_contains(hv, nv))),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|nv| h.iter().any(|hv| json_contains(hv, nv))),
        (Value::Array(h), scalar) if !scalar.is_object() => h.iter().any(|hv| hv == scalar),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => haystack == needle,
    }
}

/// Lowercased whitespace-separated query terms.
#[must_use]
pub fn query_terms(query_text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query_text.split_whitespace().map(str::to_lowercase) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Fraction of `terms` contained (case-insensitive) in `content`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn keyword_score(content: &str, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let content = content.to_lowercase();
    let hits = terms.iter().filter(|t| content.contains(t.as_str())).count();
    hits as f32 / terms.len() as f32
}

/// Ranks rows by cosine similarity to `query`.
///
/// Rows without an embedding are skipped. Results carry `similarity`, drop
/// the embedding, and are truncated to `match_count`.
#[must_use]
pub fn rank_by_similarity(
    rows: impl IntoIterator<Item = Record>,
    query: &[f32],
    match_count: usize,
) -> Vec<Record> {
    let mut scored: Vec<(f32, Record)> = rows
        .into_iter()
        .filter_map(|mut row| {
            let embedding = row.remove(EMBEDDING_COLUMN).and_then(|v| parse_embedding(&v))?;
            let score = cosine_similarity(query, &embedding);
            Some((score, row))
        })
        .collect();
    finish(&mut scored, match_count)
}

/// Ranks rows by a blend of vector and keyword relevance.
///
/// `similarity = 0.5 * vector + 0.5 * keyword`. `match_type` is `hybrid` when
/// both signals fire, otherwise `vector` or `keyword`; rows with neither are
/// dropped.
#[must_use]
pub fn hybrid_rank(
    rows: impl IntoIterator<Item = Record>,
    query_text: &str,
    query: &[f32],
    match_count: usize,
) -> Vec<Record> {
    let terms = query_terms(query_text);
    let mut scored: Vec<(f32, Record)> = rows
        .into_iter()
        .filter_map(|mut row| {
            let vector = row
                .remove(EMBEDDING_COLUMN)
                .and_then(|v| parse_embedding(&v))
                .map_or(0.0, |e| cosine_similarity(query, &e).max(0.0));
            let keyword = row
                .get(CONTENT_COLUMN)
                .and_then(Value::as_str)
                .map_or(0.0, |c| keyword_score(c, &terms));
            let match_type = match (vector > 0.0, keyword > 0.0) {
                (true, true) => "hybrid",
                (true, false) => "vector",
                (false, true) => "keyword",
                (false, false) => return None,
            };
            row.insert(MATCH_TYPE_FIELD.to_string(), Value::from(match_type));
            Some((VECTOR_WEIGHT.mul_add(vector, KEYWORD_WEIGHT * keyword), row))
        })
        .collect();
    finish(&mut scored, match_count)
}

fn finish(scored: &mut Vec<(f32, Record)>, match_count: usize) -> Vec<Record> {
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(match_count);
    scored
        .drain(..)
        .map(|(score, mut row)| {
            row.insert(SIMILARITY_FIELD.to_string(), Value::from(f64::from(score)));
            row
        })
        .collect()
}
