// S1: an identity seen for the first time is classified New and its
// canonical form is committed as a State Revision.

mod common;

use common::{driver, observed, FlakyLedger, ScriptedSource};
use driftlog_core::Fingerprinter;
use driftlog_engine::PipelineOutcome;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_first_sighting_commits_state_revision() {
    let ledger = Arc::new(FlakyLedger::new());
    let source = Arc::new(ScriptedSource::batches(vec![vec![observed("pod-a", "nginx:1.24")]]));
    let driver = driver(source, ledger.clone());

    let report = driver.run_cycle().await;

    assert!(report.is_clean());
    assert_eq!(report.new, 1);
    assert_eq!(report.states_committed, 1);
    assert!(matches!(
        report.outcomes.get("default/pod-a"),
        Some(PipelineOutcome::Recorded { .. })
    ));

    let docs = ledger.inner.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["itemtype"], "config");
    assert_eq!(docs[0]["identity"], "default/pod-a");
    assert_eq!(docs[0]["spec"]["image"], "nginx:1.24");
}

#[tokio::test]
async fn test_state_revision_content_is_canonical_form() {
    let ledger = Arc::new(FlakyLedger::new());
    let mut object = observed("pod-a", "nginx:1.24");
    object.payload["metadata"]["creationTimestamp"] = json!("2024-05-01T12:00:00+02:00");
    let source = Arc::new(ScriptedSource::batches(vec![vec![object.clone()]]));

    driver(source, ledger.clone()).run_cycle().await;

    let canonical = Fingerprinter::new().canonicalize(&object.payload).unwrap();
    let mut stored = ledger.inner.documents().remove(0);
    let fields = stored.as_object_mut().unwrap();
    for reserved in ["_id", "_vault_md", "itemtype", "identity"] {
        fields.remove(reserved);
    }
    assert_eq!(&stored, canonical.value());
    assert_eq!(stored["metadata"]["creationTimestamp"], "2024-05-01T10:00:00Z");
}

#[tokio::test]
async fn test_first_sighting_does_not_search_history() {
    let ledger = Arc::new(FlakyLedger::new());
    let source = Arc::new(ScriptedSource::batches(vec![vec![observed("pod-a", "nginx:1.24")]]));

    let report = driver(source, ledger.clone()).run_cycle().await;

    assert_eq!(ledger.calls(), (1, 0));
    assert_eq!(report.changed, 0);
    assert_eq!(report.outcomes.len(), 1);
}
