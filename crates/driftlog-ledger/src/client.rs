//! The ledger seam.

use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;

/// What the ledger reports back for an accepted write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutReceipt {
    pub document_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// Equality search over top-level fields, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    conditions: Vec<(String, Value)>,
    limit: usize,
}

impl SearchQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            conditions: Vec::new(),
            limit,
        }
    }

    /// Add an `EQ` condition; all conditions must hold.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Append-only document ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append one document.
    async fn put_document(&self, document: &Value) -> Result<PutReceipt>;

    /// Documents matching `query`, newest first, at most `query.limit()`.
    async fn search_latest(&self, query: &SearchQuery) -> Result<Vec<Value>>;

    /// Short human description for startup logs.
    fn describe(&self) -> String;
}
