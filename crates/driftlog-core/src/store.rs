//! Fingerprint Store: last-known state per identity.
//!
//! The store is a dedup cache, never the system of record. It lives for one
//! process run; after a restart every identity is seen as new once.
//!
//! Concurrency contract: `get` and `put` are safe to call concurrently for
//! distinct identities. Within one poll cycle the driver guarantees a single
//! reader/writer per identity, so no compare-and-swap is needed.

use crate::canonical::{CanonicalForm, Fingerprint};
use dashmap::DashMap;
use std::sync::Arc;

/// The last committed-to-memory state of one identity.
///
/// Replaced wholesale on change; never partially updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintRecord {
    pub identity: String,
    pub fingerprint: Fingerprint,
    pub canonical: CanonicalForm,
}

/// Storage seam for fingerprint records.
///
/// Implementations must allow concurrent access for distinct identities.
pub trait FingerprintStore: Send + Sync {
    /// Fetch the record for `identity`, if one exists
    fn get(&self, identity: &str) -> Option<Arc<FingerprintRecord>>;

    /// Insert or replace the record keyed by `record.identity`
    fn put(&self, record: Arc<FingerprintRecord>);

    /// Number of tracked identities
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store backed by a sharded map.
///
/// Each shard has its own lock, so pipelines for different identities only
/// contend when their keys hash to the same shard.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    records: DashMap<String, Arc<FingerprintRecord>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identities currently tracked, sorted
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn get(&self, identity: &str) -> Option<Arc<FingerprintRecord>> {
        // Clone the Arc out so the shard guard is released immediately.
        self.records.get(identity).map(|entry| Arc::clone(entry.value()))
    }

    fn put(&self, record: Arc<FingerprintRecord>) {
        self.records.insert(record.identity.clone(), record);
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
