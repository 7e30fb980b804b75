//! In-process append-only ledger.
//!
//! Assigns `_id` and `_vault_md` the way the Vault API does, so documents
//! fetched back look like the real thing to the diff engine.

use crate::client::{Ledger, PutReceipt, SearchQuery};
use crate::errors::{LedgerError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    documents: Mutex<Vec<Value>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored document, oldest first.
    pub fn documents(&self) -> Vec<Value> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents whose `field` equals `value`, oldest first.
    pub fn documents_where(&self, field: &str, value: &str) -> Vec<Value> {
        self.documents()
            .into_iter()
            .filter(|doc| doc.get(field).and_then(Value::as_str) == Some(value))
            .collect()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn put_document(&self, document: &Value) -> Result<PutReceipt> {
        let Value::Object(fields) = document else {
            return Err(LedgerError::unexpected(
                Some(422),
                "document must be a JSON object",
            ));
        };

        let mut docs = self
            .documents
            .lock()
            .map_err(|_| LedgerError::transient("memory ledger lock poisoned"))?;
        let sequence = docs.len() as u64 + 1;
        // Zero-padded so lexical order of `_id` is insertion order.
        let id = format!("{:024x}", sequence);

        let mut stored = fields.clone();
        stored.insert("_id".to_string(), Value::String(id.clone()));
        stored.insert(
            "_vault_md".to_string(),
            json!({
                "creator": "memory",
                "ts": chrono::Utc::now().timestamp(),
                "deleted": false
            }),
        );
        docs.push(Value::Object(stored));

        Ok(PutReceipt {
            document_id: Some(id),
            transaction_id: Some(sequence.to_string()),
        })
    }

    async fn search_latest(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let docs = self
            .documents
            .lock()
            .map_err(|_| LedgerError::transient("memory ledger lock poisoned"))?;
        Ok(docs
            .iter()
            .rev()
            .filter(|doc| query.matches(doc))
            .take(query.limit())
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        "in-memory ledger".to_string()
    }
}
