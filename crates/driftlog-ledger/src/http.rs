//! immudb Vault document API client.
//!
//! - `PUT  {base}/ledger/{ledger}/collection/{collection}/document`
//! - `POST {base}/ledger/{ledger}/collection/{collection}/documents/search`
//!
//! Authentication is a static API key sent in `X-API-Key`.

use crate::client::{Ledger, PutReceipt, SearchQuery};
use crate::errors::{LedgerError, Result};
use async_trait::async_trait;
use driftlog_core::errors::{AuditError, AuditErrorKind};
use driftlog_core_types::Sensitive;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Error bodies are cut to this many characters in messages.
const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpLedgerConfig {
    pub base_url: String,
    pub ledger: String,
    pub collection: String,
    pub api_key: Sensitive<String>,
    pub request_timeout: Duration,
}

pub struct HttpLedger {
    client: reqwest::Client,
    document_url: String,
    search_url: String,
    api_key: Sensitive<String>,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutResponse {
    document_id: Option<String>,
    transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    revisions: Vec<RevisionEntry>,
}

#[derive(Debug, Deserialize)]
struct RevisionEntry {
    document: Value,
}

impl HttpLedger {
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` when the API key is blank or the HTTP
    /// client cannot be constructed.
    pub fn new(config: HttpLedgerConfig) -> std::result::Result<Self, AuditError> {
        if config.api_key.is_blank() {
            return Err(AuditError::new(AuditErrorKind::Config)
                .with_op("http_ledger_new")
                .with_message("api_key is required for the http ledger"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AuditError::new(AuditErrorKind::Config)
                    .with_op("http_ledger_new")
                    .with_message(e.to_string())
            })?;

        let collection_url = format!(
            "{}/ledger/{}/collection/{}",
            config.base_url.trim_end_matches('/'),
            config.ledger,
            config.collection
        );
        Ok(Self {
            client,
            document_url: format!("{}/document", collection_url),
            search_url: format!("{}/documents/search", collection_url),
            api_key: config.api_key,
            request_timeout: config.request_timeout,
        })
    }

    pub fn document_url(&self) -> &str {
        &self.document_url
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }
}

/// Vault search body for `query`: conjunction of `EQ` comparisons, newest first.
pub fn search_body(query: &SearchQuery) -> Value {
    let comparisons: Vec<Value> = query
        .conditions()
        .iter()
        .map(|(field, value)| json!({"field": field, "operator": "EQ", "value": value}))
        .collect();
    json!({
        "query": {
            "expressions": [{"fieldComparisons": comparisons}],
            "orderBy": [{"field": "_id", "desc": true}],
            "limit": 0
        },
        "page": 1,
        "perPage": query.limit()
    })
}

fn from_reqwest(err: reqwest::Error, timeout: Duration) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() || err.is_body() {
        LedgerError::unexpected(None, err.to_string())
    } else {
        LedgerError::transient(err.to_string())
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_BODY_CHARS)
        .collect();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body
    };
    if is_transient_status(status) {
        Err(LedgerError::transient(format!("status {}: {}", status.as_u16(), message)))
    } else {
        Err(LedgerError::unexpected(Some(status.as_u16()), message))
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn put_document(&self, document: &Value) -> Result<PutReceipt> {
        let response = self
            .client
            .put(&self.document_url)
            .header(API_KEY_HEADER, self.api_key.expose().as_str())
            .json(document)
            .send()
            .await
            .map_err(|e| from_reqwest(e, self.request_timeout))?;
        let body: PutResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LedgerError::unexpected(None, format!("invalid put response: {}", e)))?;

        Ok(PutReceipt {
            document_id: body.document_id,
            transaction_id: body.transaction_id,
        })
    }

    async fn search_latest(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(&self.search_url)
            .header(API_KEY_HEADER, self.api_key.expose().as_str())
            .json(&search_body(query))
            .send()
            .await
            .map_err(|e| from_reqwest(e, self.request_timeout))?;
        let body: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| {
                LedgerError::unexpected(None, format!("invalid search response: {}", e))
            })?;

        Ok(body
            .revisions
            .into_iter()
            .take(query.limit())
            .map(|entry| entry.document)
            .collect())
    }

    fn describe(&self) -> String {
        format!("http ledger at {}", self.document_url)
    }
}

impl std::fmt::Debug for HttpLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLedger")
            .field("document_url", &self.document_url)
            .field("search_url", &self.search_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str) -> HttpLedgerConfig {
        HttpLedgerConfig {
            base_url: "https://vault.example/ics/api/v1/".to_string(),
            ledger: "default".to_string(),
            collection: "pods".to_string(),
            api_key: Sensitive::new(api_key.to_string()),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_urls_built_from_coordinates() {
        let ledger = HttpLedger::new(config("k")).unwrap();
        assert_eq!(
            ledger.document_url(),
            "https://vault.example/ics/api/v1/ledger/default/collection/pods/document"
        );
        assert_eq!(
            ledger.search_url(),
            "https://vault.example/ics/api/v1/ledger/default/collection/pods/documents/search"
        );
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let err = HttpLedger::new(config("  ")).unwrap_err();
        assert_eq!(err.kind(), AuditErrorKind::Config);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let ledger = HttpLedger::new(config("super-secret")).unwrap();
        assert!(!format!("{:?}", ledger).contains("super-secret"));
    }

    #[test]
    fn test_search_body_shape() {
        let query = SearchQuery::new(2)
            .field_eq("itemtype", "config")
            .field_eq("identity", "default/web");
        assert_eq!(
            search_body(&query),
            json!({
                "query": {
                    "expressions": [{"fieldComparisons": [
                        {"field": "itemtype", "operator": "EQ", "value": "config"},
                        {"field": "identity", "operator": "EQ", "value": "default/web"}
                    ]}],
                    "orderBy": [{"field": "_id", "desc": true}],
                    "limit": 0
                },
                "page": 1,
                "perPage": 2
            })
        );
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
