//! driftlog ledger - append-only ledger access
//!
//! - `Ledger` trait: the two calls the audit pipeline needs
//! - `LedgerError`: discriminated result of every ledger call
//! - `RetryPolicy`: bounded exponential backoff with per-attempt timeout
//! - `HttpLedger`: immudb Vault document REST API
//! - `MemoryLedger`: in-process ledger for local runs and tests

pub mod client;
pub mod errors;
pub mod http;
pub mod memory;
pub mod retry;

pub use client::{Ledger, PutReceipt, SearchQuery};
pub use errors::LedgerError;
pub use http::{HttpLedger, HttpLedgerConfig};
pub use memory::MemoryLedger;
pub use retry::{Attempted, Exhausted, RetryPolicy};
