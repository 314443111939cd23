//! PostgREST HTTP client.
//!
//! Row operations mirror the `SQLite` store: select, count, insert, replace,
//! delete, read-then-write upsert and update, ordered cascades. Every HTTP
//! failure is translated to a [`crate::Error`] here.

use super::params::{Params, filter_params, select_params};
use crate::config::SupabaseConfig;
use crate::models::Record;
use crate::schema::{FieldType, TableDefinition};
use crate::storage::plan::{self, CascadeStep};
use crate::storage::query::Select;
use crate::storage::record::{prepare_update, prepare_upsert, primary_key_value};
use crate::storage::similarity::parse_embedding;
use crate::{Error, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const PREFER: &str = "Prefer";
const RETURN_ROWS: &str = "return=representation";
const COUNT_EXACT: &str = "count=exact";

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Connection to one Supabase project's REST endpoint.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    table_prefix: String,
}

impl RestClient {
    /// Builds a client from settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the URL or service key is
    /// missing, and [`Error::ConnectionFailed`] if the HTTP client cannot be
    /// built.
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidInput("SUPABASE_URL is not set".to_string()))?;
        let key = config
            .service_key
            .as_ref()
            .map(|k| k.expose_secret().trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::InvalidInput("SUPABASE_SERVICE_KEY is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&key)
            .map_err(|_| Error::InvalidInput("service key is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| Error::InvalidInput("service key is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .user_agent(format!("archon-dal/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| Error::ConnectionFailed {
                operation: "build_http_client".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            table_prefix: config.table_prefix.clone(),
        })
    }

    /// REST endpoint root, e.g. `https://xyz.supabase.co/rest/v1`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &TableDefinition) -> String {
        format!("{}/{}{}", self.base_url, self.table_prefix, table.name)
    }

    fn request(&self, method: Method, table: &TableDefinition, params: &Params) -> RequestBuilder {
        self.http.request(method, self.table_url(table)).query(params)
    }

    /// Runs a select.
    pub async fn select(&self, select: &Select, operation: &str) -> Result<Vec<Record>> {
        let params = select_params(select)?;
        let response = send(self.request(Method::GET, select.table, &params), operation).await?;
        decode_rows(select.table, response, operation).await
    }

    /// Returns the first row of a select.
    pub async fn first(&self, select: Select, operation: &str) -> Result<Option<Record>> {
        let select = select.limit(1);
        Ok(self.select(&select, operation).await?.into_iter().next())
    }

    /// Counts rows matching a select's filters via `Content-Range`.
    pub async fn count(&self, select: &Select, operation: &str) -> Result<u64> {
        let params = filter_params(select)?;
        let response = send(
            self.request(Method::HEAD, select.table, &params)
                .header(PREFER, COUNT_EXACT),
            operation,
        )
        .await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range(range).ok_or_else(|| {
            Error::operation(operation, format!("unexpected Content-Range '{range}'"))
        })
    }

    /// Inserts prepared rows and returns what the server stored.
    pub async fn insert_many(
        &self,
        table: &TableDefinition,
        rows: Vec<Record>,
        operation: &str,
    ) -> Result<Vec<Record>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let body = Value::Array(rows.into_iter().map(Value::Object).collect());
        let response = send(
            self.request(Method::POST, table, &Params::new())
                .header(PREFER, RETURN_ROWS)
                .json(&body),
            operation,
        )
        .await?;
        decode_rows(table, response, operation).await
    }

    /// Inserts one prepared row.
    pub async fn insert(&self, table: &TableDefinition, row: Record, operation: &str) -> Result<Record> {
        self.insert_many(table, vec![row], operation)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::operation(operation, "insert returned no row"))
    }

    /// Rewrites an existing row by primary key.
    pub async fn replace(&self, table: &'static TableDefinition, row: Record, operation: &str) -> Result<Record> {
        let key = primary_key_value(table, &row)
            .ok_or_else(|| Error::InvalidInput(format!("{} row has no primary key", table.name)))?
            .to_string();
        let params = filter_params(&plan::by_key(table, &key))?;
        let response = send(
            self.request(Method::PATCH, table, &params)
                .header(PREFER, RETURN_ROWS)
                .json(&Value::Object(row)),
            operation,
        )
        .await?;
        decode_rows(table, response, operation)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::operation(operation, format!("{} row '{key}' vanished", table.name)))
    }

    /// Deletes every row matching the select's filters.
    pub async fn delete(&self, select: &Select, operation: &str) -> Result<u64> {
        let params = filter_params(select)?;
        let response = send(
            self.request(Method::DELETE, select.table, &params)
                .header(PREFER, RETURN_ROWS),
            operation,
        )
        .await?;
        let deleted = decode_rows(select.table, response, operation).await?;
        Ok(u64::try_from(deleted.len()).unwrap_or(u64::MAX))
    }

    /// Inserts `incoming`, or merges it into the row `existing` selects.
    pub async fn upsert(&self, existing: Select, incoming: Record, operation: &str) -> Result<Record> {
        let table = existing.table;
        let current = self.first(existing, operation).await?;
        let row = prepare_upsert(table, current.as_ref(), incoming)?;
        if current.is_some() {
            self.replace(table, row, operation).await
        } else {
            self.insert(table, row, operation).await
        }
    }

    /// Merges `updates` into the row with primary key `key`.
    pub async fn update(
        &self,
        table: &'static TableDefinition,
        key: &str,
        updates: Record,
        operation: &str,
    ) -> Result<Option<Record>> {
        let Some(existing) = self.first(plan::by_key(table, key), operation).await? else {
            return Ok(None);
        };
        let row = prepare_update(table, &existing, updates)?;
        self.replace(table, row, operation).await.map(Some)
    }

    /// Deletes children in order, then the parent.
    ///
    /// A failing step stops the cascade before the parent is touched.
    pub async fn cascade(
        &self,
        steps: &[CascadeStep],
        parent: &'static TableDefinition,
        key: &str,
        operation: &str,
    ) -> Result<bool> {
        for step in steps {
            let removed = self.delete(&step.select(key), operation).await?;
            tracing::trace!(table = step.table.name, removed, "cascade step");
        }
        Ok(self.delete(&plan::by_key(parent, key), operation).await? > 0)
    }

    /// Calls a stored function.
    pub async fn rpc(&self, function_name: &str, params: &Value, operation: &str) -> Result<Value> {
        let url = format!("{}/rpc/{function_name}", self.base_url);
        let response = self
            .http
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::Unsupported(format!(
                "rpc function '{function_name}' does not exist on the server"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(operation, status, &body));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::operation(operation, e))
    }
}

/// Sends a request and maps transport and status failures.
async fn send(request: RequestBuilder, operation: &str) -> Result<Response> {
    let response = request.send().await.map_err(|e| transport_error(operation, &e))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(operation, status, &body))
}

fn transport_error(operation: &str, e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            operation: operation.to_string(),
            cause: e.to_string(),
        }
    } else if e.is_connect() {
        Error::ConnectionFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        }
    } else {
        Error::operation(operation, e)
    }
}

/// Translates an error response.
pub fn status_error(operation: &str, status: StatusCode, body: &str) -> Error {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .or(parsed.details.clone())
        .unwrap_or_else(|| body.to_string());
    let cause = format!("{} {}", status.as_u16(), message);
    let operation = operation.to_string();
    let unique_violation = matches!(parsed.code.as_deref(), Some("23505" | "23503"));
    match status {
        StatusCode::CONFLICT => Error::ConstraintViolation { operation, cause },
        _ if unique_violation => Error::ConstraintViolation { operation, cause },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::ConnectionFailed { operation, cause },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout { operation, cause },
        _ => Error::OperationFailed { operation, cause },
    }
}

/// Reads the total from `0-9/42` or `*/42`.
pub fn parse_content_range(range: &str) -> Option<u64> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}

async fn decode_rows(table: &TableDefinition, response: Response, operation: &str) -> Result<Vec<Record>> {
    let body = response
        .text()
        .await
        .map_err(|e| Error::operation(operation, e))?;
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(&body).map_err(|e| Error::operation(operation, e))?;
    Ok(rows_from_value(table, value))
}

/// Normalizes rows returned by PostgREST.
///
/// `pgvector` columns come back as text such as `"[0.1,0.2]"`; they are
/// turned into JSON arrays so callers see the same shape on every backend.
pub fn rows_from_value(table: &TableDefinition, value: Value) -> Vec<Record> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => vec![Value::Object(map)],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut row) => {
                for field in table.fields.iter().filter(|f| f.field_type == FieldType::Vector) {
                    if let Some(Value::String(text)) = row.get(field.name)
                        && let Some(vector) = parse_embedding(&Value::String(text.clone()))
                    {
                        row.insert(
                            field.name.to_string(),
                            crate::storage::similarity::embedding_to_value(&vector),
                        );
                    }
                }
                Some(row)
            },
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::schema::tables;
    use secrecy::SecretString;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(StatusCode::CONFLICT, "{}" => ErrorKind::ConstraintViolation; "conflict")]
    #[test_case(StatusCode::BAD_REQUEST, r#"{"code":"23505","message":"dup"}"# => ErrorKind::ConstraintViolation; "unique code")]
    #[test_case(StatusCode::UNAUTHORIZED, "" => ErrorKind::ConnectionFailed; "unauthorized")]
    #[test_case(StatusCode::FORBIDDEN, "" => ErrorKind::ConnectionFailed; "forbidden")]
    #[test_case(StatusCode::GATEWAY_TIMEOUT, "" => ErrorKind::Timeout; "gateway timeout")]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, "boom" => ErrorKind::Backend; "server error")]
    fn test_status_error(status: StatusCode, body: &str) -> ErrorKind {
        status_error("op", status, body).kind()
    }

    #[test]
    fn test_status_error_prefers_message() {
        let err = status_error(
            "insert_document",
            StatusCode::BAD_REQUEST,
            r#"{"code":"22P02","message":"invalid input syntax"}"#,
        );
        assert!(err.to_string().contains("invalid input syntax"));
    }

    #[test_case("0-9/42" => Some(42))]
    #[test_case("*/0" => Some(0))]
    #[test_case("*/*" => None)]
    #[test_case("" => None)]
    fn test_parse_content_range(range: &str) -> Option<u64> {
        parse_content_range(range)
    }

    #[test]
    fn test_vector_text_is_decoded() {
        let rows = rows_from_value(
            &tables::DOCUMENTS,
            json!([{"id": "d1", "embedding": "[0.5,1]", "content": "[not a vector]"}]),
        );
        assert_eq!(rows[0]["embedding"], json!([0.5, 1.0]));
        assert_eq!(rows[0]["content"], "[not a vector]");
    }

    #[test]
    fn test_new_requires_url_and_key() {
        let mut config = SupabaseConfig::default();
        assert_eq!(RestClient::new(&config).unwrap_err().kind(), ErrorKind::InvalidInput);
        config.url = Some("https://x.supabase.co/".to_string());
        assert_eq!(RestClient::new(&config).unwrap_err().kind(), ErrorKind::InvalidInput);
        config.service_key = Some(SecretString::from("key"));
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://x.supabase.co/rest/v1");
        assert_eq!(
            client.table_url(&tables::SOURCES),
            "https://x.supabase.co/rest/v1/archon_sources"
        );
    }
}
