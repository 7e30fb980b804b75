use async_trait::async_trait;
use driftlog_core::errors::AuditError;
use driftlog_core::{ChangeDetector, Fingerprinter, MemoryFingerprintStore};
use driftlog_engine::{
    AuditCommitter, CommitterConfig, DriverConfig, ObservedObject, PollDriver, SnapshotSource,
};
use driftlog_ledger::{Ledger, LedgerError, MemoryLedger, PutReceipt, RetryPolicy, SearchQuery};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A pod whose only configuration is `spec.image`
#[allow(dead_code)]
pub fn pod(name: &str, image: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": "default"},
        "spec": {"image": image}
    })
}

#[allow(dead_code)]
pub fn observed(name: &str, image: &str) -> ObservedObject {
    ObservedObject::new(format!("default/{}", name), pod(name, image))
}

/// Source replaying scripted polls; repeats the last batch once exhausted
pub struct ScriptedSource {
    polls: Mutex<VecDeque<Result<Vec<ObservedObject>, AuditError>>>,
    last: Mutex<Vec<ObservedObject>>,
    pub poll_count: AtomicU32,
}

impl ScriptedSource {
    #[allow(dead_code)]
    pub fn new(polls: Vec<Result<Vec<ObservedObject>, AuditError>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            last: Mutex::new(Vec::new()),
            poll_count: AtomicU32::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn batches(batches: Vec<Vec<ObservedObject>>) -> Self {
        Self::new(batches.into_iter().map(Ok).collect())
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn poll(&self) -> Result<Vec<ObservedObject>, AuditError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(Ok(batch)) => {
                *self.last.lock().unwrap() = batch.clone();
                Ok(batch)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    fn describe(&self) -> String {
        "scripted source".to_string()
    }
}

/// How a matching put fails
#[allow(dead_code)]
#[derive(Clone)]
pub enum Failure {
    /// Return the error without writing
    Error(LedgerError),
    /// Never answer
    Hang,
    /// Write the document, then report the error anyway
    LandThenError(LedgerError),
}

struct FailureRule {
    identity: Option<String>,
    itemtype: Option<String>,
    remaining: u32,
    failure: Failure,
}

/// Memory ledger with injectable put failures and call counters
pub struct FlakyLedger {
    pub inner: MemoryLedger,
    rules: Mutex<Vec<FailureRule>>,
    pub put_calls: AtomicU32,
    pub search_calls: AtomicU32,
}

#[allow(dead_code)]
impl FlakyLedger {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            rules: Mutex::new(Vec::new()),
            put_calls: AtomicU32::new(0),
            search_calls: AtomicU32::new(0),
        }
    }

    /// Fail the next `times` puts for `identity` (any itemtype when `None`)
    pub fn fail_puts(&self, identity: &str, itemtype: Option<&str>, times: u32, failure: Failure) {
        self.rules.lock().unwrap().push(FailureRule {
            identity: Some(identity.to_string()),
            itemtype: itemtype.map(str::to_string),
            remaining: times,
            failure,
        });
    }

    pub fn calls(&self) -> (u32, u32) {
        (
            self.put_calls.load(Ordering::SeqCst),
            self.search_calls.load(Ordering::SeqCst),
        )
    }

    fn take_failure(&self, document: &Value) -> Option<Failure> {
        let mut rules = self.rules.lock().unwrap();
        let identity = document.get("identity").and_then(Value::as_str);
        let itemtype = document.get("itemtype").and_then(Value::as_str);
        let rule = rules.iter_mut().find(|rule| {
            rule.remaining > 0
                && rule.identity.as_deref().map_or(true, |id| Some(id) == identity)
                && rule.itemtype.as_deref().map_or(true, |t| Some(t) == itemtype)
        })?;
        rule.remaining -= 1;
        Some(rule.failure.clone())
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn put_document(&self, document: &Value) -> Result<PutReceipt, LedgerError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        match self.take_failure(document) {
            None => self.inner.put_document(document).await,
            Some(Failure::Error(err)) => Err(err),
            Some(Failure::Hang) => std::future::pending().await,
            Some(Failure::LandThenError(err)) => {
                self.inner.put_document(document).await?;
                Err(err)
            }
        }
    }

    async fn search_latest(&self, query: &SearchQuery) -> Result<Vec<Value>, LedgerError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search_latest(query).await
    }

    fn describe(&self) -> String {
        "flaky ledger".to_string()
    }
}

/// Retry policy with short delays; attempt timeout 50ms
#[allow(dead_code)]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2,
        request_timeout: Duration::from_millis(50),
    }
}

#[allow(dead_code)]
pub fn committer(ledger: Arc<dyn Ledger>) -> AuditCommitter {
    AuditCommitter::new(
        ledger,
        CommitterConfig {
            retry: fast_retry(),
            ..CommitterConfig::default()
        },
    )
}

#[allow(dead_code)]
pub fn detector() -> ChangeDetector {
    ChangeDetector::new(Fingerprinter::new(), Arc::new(MemoryFingerprintStore::new()))
}

#[allow(dead_code)]
pub fn driver(source: Arc<dyn SnapshotSource>, ledger: Arc<dyn Ledger>) -> PollDriver {
    PollDriver::new(
        source,
        detector(),
        Arc::new(committer(ledger)),
        DriverConfig {
            poll_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_millis(500),
            ..DriverConfig::default()
        },
    )
}
