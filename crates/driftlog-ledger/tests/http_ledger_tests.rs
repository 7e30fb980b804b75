// HttpLedger against an in-test HTTP responder

mod common;

use common::{spawn_responder, Reply};
use driftlog_core_types::Sensitive;
use driftlog_ledger::{HttpLedger, HttpLedgerConfig, Ledger, LedgerError, SearchQuery};
use serde_json::json;
use std::time::Duration;

fn ledger(base_url: &str, timeout: Duration) -> HttpLedger {
    HttpLedger::new(HttpLedgerConfig {
        base_url: base_url.to_string(),
        ledger: "default".to_string(),
        collection: "default".to_string(),
        api_key: Sensitive::new("test-key".to_string()),
        request_timeout: timeout,
    })
    .unwrap()
}

#[tokio::test]
async fn test_put_document_request_and_receipt() {
    let (base, recorded) = spawn_responder(vec![Reply::Json(
        200,
        r#"{"documentId":"0001","transactionId":"42"}"#.to_string(),
    )])
    .await;
    let ledger = ledger(&base, Duration::from_secs(5));

    let receipt = ledger
        .put_document(&json!({"itemtype": "config", "identity": "default/web"}))
        .await
        .unwrap();

    assert_eq!(receipt.document_id.as_deref(), Some("0001"));
    assert_eq!(receipt.transaction_id.as_deref(), Some("42"));

    let requests = recorded.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].path, "/ledger/default/collection/default/document");
    assert_eq!(requests[0].header("x-api-key"), Some("test-key"));
    assert_eq!(requests[0].json()["identity"], "default/web");
}

#[tokio::test]
async fn test_search_latest_reads_revision_documents() {
    let (base, recorded) = spawn_responder(vec![Reply::Json(
        200,
        json!({
            "page": 1,
            "perPage": 2,
            "revisions": [
                {"document": {"_id": "2", "spec": {"image": "b"}}, "revision": "2", "transactionId": "9"},
                {"document": {"_id": "1", "spec": {"image": "a"}}, "revision": "1", "transactionId": "8"}
            ]
        })
        .to_string(),
    )])
    .await;
    let ledger = ledger(&base, Duration::from_secs(5));

    let query = SearchQuery::new(2)
        .field_eq("itemtype", "config")
        .field_eq("identity", "default/web");
    let docs = ledger.search_latest(&query).await.unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["_id"], "2");
    assert_eq!(docs[1]["spec"]["image"], "a");

    let requests = recorded.lock().unwrap().clone();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(
        requests[0].path,
        "/ledger/default/collection/default/documents/search"
    );
    let body = requests[0].json();
    assert_eq!(body["perPage"], 2);
    assert_eq!(body["query"]["orderBy"][0]["desc"], true);
}

#[tokio::test]
async fn test_empty_search_result() {
    let (base, _) = spawn_responder(vec![Reply::Json(200, r#"{"page":1}"#.to_string())]).await;
    let docs = ledger(&base, Duration::from_secs(5))
        .search_latest(&SearchQuery::new(2))
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_unauthorized_is_unexpected_response() {
    let (base, _) = spawn_responder(vec![Reply::Json(
        401,
        r#"{"message":"invalid api key"}"#.to_string(),
    )])
    .await;
    let err = ledger(&base, Duration::from_secs(5))
        .put_document(&json!({"a": 1}))
        .await
        .unwrap_err();

    match &err {
        LedgerError::UnexpectedResponse { status, message } => {
            assert_eq!(*status, Some(401));
            assert!(message.contains("invalid api key"));
        }
        other => panic!("expected UnexpectedResponse, got {:?}", other),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_service_unavailable_is_transient() {
    let (base, _) = spawn_responder(vec![Reply::Json(503, "{}".to_string())]).await;
    let err = ledger(&base, Duration::from_secs(5))
        .put_document(&json!({"a": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Transient { .. }));
}

#[tokio::test]
async fn test_malformed_body_is_unexpected_response() {
    let (base, _) = spawn_responder(vec![Reply::Json(200, "not json".to_string())]).await;
    let err = ledger(&base, Duration::from_secs(5))
        .put_document(&json!({"a": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnexpectedResponse { status: None, .. }));
}

#[tokio::test]
async fn test_hung_server_times_out() {
    let (base, _) = spawn_responder(vec![Reply::Hang]).await;
    let err = ledger(&base, Duration::from_millis(200))
        .put_document(&json!({"a": 1}))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::Timeout { timeout_ms: 200 });
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = ledger(&format!("http://{}", addr), Duration::from_secs(2))
        .put_document(&json!({"a": 1}))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}
