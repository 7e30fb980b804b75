//! Operation-boundary logging macros.
//!
//! Field names follow `driftlog_core_types::schema`.

/// Log the start of an operation
///
/// ```
/// # use driftlog_core::log_op_start;
/// log_op_start!("commit_state");
/// log_op_start!("commit_state", identity = "default/web");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use driftlog_core::log_op_end;
/// log_op_end!("commit_state", duration_ms = 42);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error. `$err` is anything convertible into `AuditError`.
///
/// ```
/// # use driftlog_core::{log_op_error, errors::{AuditError, AuditErrorKind}};
/// let err = AuditError::new(AuditErrorKind::CommitFailure).with_attempts(3);
/// log_op_error!("commit_state", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let audit_err: $crate::errors::AuditError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?audit_err.kind(),
            err.code = audit_err.code(),
            error = %audit_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let audit_err: $crate::errors::AuditError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?audit_err.kind(),
            err.code = audit_err.code(),
            error = %audit_err,
            $($field)*
        );
    }};
}
