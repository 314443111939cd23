//! Named search functions reachable through `execute_rpc`.
//!
//! Supabase forwards these to its stored functions. SQLite and the Fake
//! parse them into an [`RpcCall`] and run the equivalent repository search.

use super::traits::{CodeExampleRepository, DocumentRepository};
use crate::models::Record;
use crate::{Error, Result};
use serde_json::{Map, Value, json};

/// Stored function ranking documents by vector similarity.
pub const MATCH_DOCUMENTS: &str = "match_documents";
/// Stored function ranking code examples by vector similarity.
pub const MATCH_CODE_EXAMPLES: &str = "match_code_examples";
/// Stored function blending vector and keyword relevance.
pub const HYBRID_SEARCH: &str = "hybrid_search";

/// Result count when the caller passes none.
pub const DEFAULT_MATCH_COUNT: usize = 10;

/// A parsed search function invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    /// `match_documents(query_embedding, match_count, filter_metadata?)`.
    MatchDocuments {
        /// Query vector.
        query_embedding: Vec<f32>,
        /// Maximum results.
        match_count: usize,
        /// JSON containment filter on `metadata`.
        filter_metadata: Option<Record>,
    },
    /// `match_code_examples(query_embedding, match_count, filter_metadata?, source_id?)`.
    MatchCodeExamples {
        /// Query vector.
        query_embedding: Vec<f32>,
        /// Maximum results.
        match_count: usize,
        /// JSON containment filter on `metadata`.
        filter_metadata: Option<Record>,
        /// Restrict to one source.
        source_id: Option<String>,
    },
    /// `hybrid_search(query_text, query_embedding, match_count, filter_metadata?)`.
    HybridSearch {
        /// Keyword query.
        query_text: String,
        /// Query vector.
        query_embedding: Vec<f32>,
        /// Maximum results.
        match_count: usize,
        /// JSON containment filter on `metadata`.
        filter_metadata: Option<Record>,
    },
}

impl RpcCall {
    /// Parses a function name and its JSON parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for unknown function names and
    /// [`Error::InvalidInput`] for malformed parameters.
    pub fn parse(function_name: &str, params: &Value) -> Result<Self> {
        let params = params.as_object().cloned().unwrap_or_default();
        match function_name {
            MATCH_DOCUMENTS => Ok(Self::MatchDocuments {
                query_embedding: embedding_param(&params)?,
                match_count: count_param(&params)?,
                filter_metadata: filter_param(&params)?,
            }),
            MATCH_CODE_EXAMPLES => Ok(Self::MatchCodeExamples {
                query_embedding: embedding_param(&params)?,
                match_count: count_param(&params)?,
                filter_metadata: filter_param(&params)?,
                source_id: params
                    .get("source_filter")
                    .or_else(|| params.get("source_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            HYBRID_SEARCH => Ok(Self::HybridSearch {
                query_text: params
                    .get("query_text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::InvalidInput("hybrid_search requires 'query_text'".to_string())
                    })?
                    .to_string(),
                query_embedding: embedding_param(&params)?,
                match_count: count_param(&params)?,
                filter_metadata: filter_param(&params)?,
            }),
            other => Err(Error::Unsupported(format!(
                "rpc function '{other}' has no local implementation"
            ))),
        }
    }

    /// Returns the stored function name.
    #[must_use]
    pub const fn function_name(&self) -> &'static str {
        match self {
            Self::MatchDocuments { .. } => MATCH_DOCUMENTS,
            Self::MatchCodeExamples { .. } => MATCH_CODE_EXAMPLES,
            Self::HybridSearch { .. } => HYBRID_SEARCH,
        }
    }

    /// Renders the PostgREST request body for this call.
    #[must_use]
    pub fn to_params(&self) -> Value {
        let filter = |f: &Option<Record>| Value::Object(f.clone().unwrap_or_default());
        match self {
            Self::MatchDocuments {
                query_embedding,
                match_count,
                filter_metadata,
            } => json!({
                "query_embedding": query_embedding,
                "match_count": match_count,
                "filter": filter(filter_metadata),
            }),
            Self::MatchCodeExamples {
                query_embedding,
                match_count,
                filter_metadata,
                source_id,
            } => {
                let mut body = json!({
                    "query_embedding": query_embedding,
                    "match_count": match_count,
                    "filter": filter(filter_metadata),
                });
                if let (Some(source_id), Some(map)) = (source_id, body.as_object_mut()) {
                    map.insert("source_filter".to_string(), Value::from(source_id.as_str()));
                }
                body
            },
            Self::HybridSearch {
                query_text,
                query_embedding,
                match_count,
                filter_metadata,
            } => json!({
                "query_text": query_text,
                "query_embedding": query_embedding,
                "match_count": match_count,
                "filter": filter(filter_metadata),
            }),
        }
    }
}

/// Runs a search function against a repository's own search operations.
///
/// # Errors
///
/// Returns the parse errors of [`RpcCall::parse`] and any search failure.
pub async fn execute_locally<R>(repository: &R, function_name: &str, params: &Value) -> Result<Value>
where
    R: DocumentRepository + CodeExampleRepository + ?Sized,
{
    let rows = match RpcCall::parse(function_name, params)? {
        RpcCall::MatchDocuments {
            query_embedding,
            match_count,
            filter_metadata,
        } => {
            repository
                .search_documents_vector(&query_embedding, match_count, filter_metadata.as_ref())
                .await?
        },
        RpcCall::MatchCodeExamples {
            query_embedding,
            match_count,
            filter_metadata,
            source_id,
        } => {
            repository
                .search_code_examples(
                    &query_embedding,
                    match_count,
                    filter_metadata.as_ref(),
                    source_id.as_deref(),
                )
                .await?
        },
        RpcCall::HybridSearch {
            query_text,
            query_embedding,
            match_count,
            filter_metadata,
        } => {
            repository
                .search_documents_hybrid(
                    &query_text,
                    &query_embedding,
                    match_count,
                    filter_metadata.as_ref(),
                )
                .await?
        },
    };
    Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
}

#[allow(clippy::cast_possible_truncation)]
fn embedding_param(params: &Map<String, Value>) -> Result<Vec<f32>> {
    let items = params
        .get("query_embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidInput("'query_embedding' must be an array".to_string()))?;
    items
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::InvalidInput("'query_embedding' must contain numbers".to_string())
            })
        })
        .collect()
}

fn count_param(params: &Map<String, Value>) -> Result<usize> {
    match params.get("match_count") {
        None | Some(Value::Null) => Ok(DEFAULT_MATCH_COUNT),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::InvalidInput("'match_count' must be a non-negative integer".to_string())
            }),
    }
}

fn filter_param(params: &Map<String, Value>) -> Result<Option<Record>> {
    match params.get("filter").or_else(|| params.get("filter_metadata")) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(Error::InvalidInput(
            "'filter' must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_parse_match_documents_defaults() {
        let call = RpcCall::parse(MATCH_DOCUMENTS, &json!({"query_embedding": [1, 0]})).unwrap();
        assert_eq!(
            call,
            RpcCall::MatchDocuments {
                query_embedding: vec![1.0, 0.0],
                match_count: DEFAULT_MATCH_COUNT,
                filter_metadata: None,
            }
        );
    }

    #[test]
    fn test_parse_code_examples_source_filter() {
        let call = RpcCall::parse(
            MATCH_CODE_EXAMPLES,
            &json!({"query_embedding": [1], "match_count": 3, "source_filter": "s1"}),
        )
        .unwrap();
        let RpcCall::MatchCodeExamples { source_id, match_count, .. } = call else {
            panic!("wrong variant");
        };
        assert_eq!(source_id.as_deref(), Some("s1"));
        assert_eq!(match_count, 3);
    }

    #[test]
    fn test_parse_unknown_function() {
        let err = RpcCall::parse("drop_everything", &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_parse_bad_params() {
        let err = RpcCall::parse(MATCH_DOCUMENTS, &json!({"query_embedding": "x"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = RpcCall::parse(HYBRID_SEARCH, &json!({"query_embedding": [1]})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = RpcCall::parse(
            MATCH_DOCUMENTS,
            &json!({"query_embedding": [1], "match_count": -1}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_to_params_roundtrip() {
        let call = RpcCall::MatchCodeExamples {
            query_embedding: vec![0.5],
            match_count: 2,
            filter_metadata: None,
            source_id: Some("s1".to_string()),
        };
        let reparsed = RpcCall::parse(call.function_name(), &call.to_params()).unwrap();
        assert_eq!(reparsed, call);
    }
}
