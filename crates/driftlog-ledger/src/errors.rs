//! Ledger call failures.
//!
//! Every ledger interaction returns one of these instead of raising on an
//! unexpected status, so the committer can isolate failures per identity.

use driftlog_core::errors::{AuditError, AuditErrorKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Connectivity failure or a status that signals a temporary condition
    #[error("transient ledger failure: {message}")]
    Transient { message: String },

    /// The call did not complete within the per-request timeout
    #[error("ledger call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-success status or a body that could not be understood
    #[error("unexpected ledger response{}: {message}", status_suffix(.status))]
    UnexpectedResponse { status: Option<u16>, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" (status {})", s))
        .unwrap_or_default()
}

impl LedgerError {
    pub fn transient(message: impl Into<String>) -> Self {
        LedgerError::Transient {
            message: message.into(),
        }
    }

    pub fn unexpected(status: Option<u16>, message: impl Into<String>) -> Self {
        LedgerError::UnexpectedResponse {
            status,
            message: message.into(),
        }
    }

    /// Transient failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Transient { .. } | LedgerError::Timeout { .. }
        )
    }

    pub fn kind(&self) -> AuditErrorKind {
        if self.is_retryable() {
            AuditErrorKind::TransientNetwork
        } else {
            AuditErrorKind::UnexpectedResponse
        }
    }
}

impl From<LedgerError> for AuditError {
    fn from(err: LedgerError) -> Self {
        AuditError::new(err.kind())
            .with_op("ledger")
            .with_message(err.to_string())
    }
}
