// Change detector behavior against the in-memory fingerprint store

mod common;

use common::pod;
use driftlog_core::errors::AuditErrorKind;
use driftlog_core::{
    ChangeDetector, Classification, Detection, FingerprintStore, Fingerprinter,
    MemoryFingerprintStore,
};
use serde_json::json;
use std::sync::Arc;

fn detector() -> (ChangeDetector, Arc<MemoryFingerprintStore>) {
    let store = Arc::new(MemoryFingerprintStore::new());
    let detector = ChangeDetector::new(Fingerprinter::new(), store.clone());
    (detector, store)
}

#[test]
fn test_first_sighting_is_new_and_stored() {
    // S1: first observation of pod-a
    let (detector, store) = detector();
    let detection = detector.classify("pod-a", &pod("pod-a", "nginx:1.24")).unwrap();

    assert_eq!(detection.classification(), Classification::New);
    let stored = store.get("pod-a").unwrap();
    assert_eq!(&stored.fingerprint, detection.fingerprint());
}

#[test]
fn test_reordered_fields_are_unchanged() {
    // S2: same content, keys reordered in the raw input
    let (detector, store) = detector();
    detector
        .classify("pod-a", &json!({"spec": {"image": "nginx", "replicas": 1}, "kind": "Pod"}))
        .unwrap();
    let before = store.get("pod-a").unwrap();

    let detection = detector
        .classify("pod-a", &json!({"kind": "Pod", "spec": {"replicas": 1, "image": "nginx"}}))
        .unwrap();

    assert!(matches!(detection, Detection::Unchanged { .. }));
    let after = store.get("pod-a").unwrap();
    assert!(Arc::ptr_eq(&before, &after), "store must not be written on Unchanged");
}

#[test]
fn test_changed_replaces_record_wholesale() {
    // S3: spec.image differs
    let (detector, store) = detector();
    detector.classify("pod-a", &pod("pod-a", "nginx:1.24")).unwrap();

    let detection = detector.classify("pod-a", &pod("pod-a", "nginx:1.25")).unwrap();

    match detection {
        Detection::Changed { record, previous } => {
            assert_ne!(record.fingerprint, previous.fingerprint);
            assert_eq!(previous.canonical.value()["spec"]["image"], "nginx:1.24");
            assert_eq!(record.canonical.value()["spec"]["image"], "nginx:1.25");
            assert_eq!(store.get("pod-a").unwrap().fingerprint, record.fingerprint);
        }
        other => panic!("expected Changed, got {:?}", other.classification()),
    }
}

#[test]
fn test_fresh_store_reclassifies_new() {
    // S4: a new process starts with an empty store
    let (first, _) = detector();
    first.classify("pod-b", &pod("pod-b", "redis:7")).unwrap();

    let (restarted, _) = detector();
    let detection = restarted.classify("pod-b", &pod("pod-b", "redis:7")).unwrap();
    assert_eq!(detection.classification(), Classification::New);
}

#[test]
fn test_encoding_failure_leaves_store_untouched() {
    let store = Arc::new(MemoryFingerprintStore::new());
    let detector = ChangeDetector::new(Fingerprinter::new().with_max_depth(2), store.clone());

    let err = detector
        .classify("deep", &json!({"a": {"b": {"c": 1}}}))
        .unwrap_err();

    assert_eq!(err.kind(), AuditErrorKind::Encoding);
    assert_eq!(err.identity(), Some("deep"));
    assert!(store.is_empty());
}

#[test]
fn test_concurrent_distinct_identities() {
    let (detector, store) = detector();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let detector = detector.clone();
            std::thread::spawn(move || {
                let identity = format!("default/pod-{}", i);
                detector
                    .classify(&identity, &pod(&identity, "nginx:1.25"))
                    .unwrap()
                    .classification()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Classification::New);
    }
    assert_eq!(store.len(), 16);
}

#[test]
fn test_store_keeps_state_once_classified() {
    // the record is written at classification time; a later commit failure
    // does not roll it back
    let (detector, store) = detector();
    detector.classify("pod-a", &pod("pod-a", "nginx:1.24")).unwrap();
    let changed = detector.classify("pod-a", &pod("pod-a", "nginx:1.25")).unwrap();
    assert_eq!(&store.get("pod-a").unwrap().fingerprint, changed.fingerprint());

    let again = detector.classify("pod-a", &pod("pod-a", "nginx:1.25")).unwrap();
    assert_eq!(again.classification(), Classification::Unchanged);
}
