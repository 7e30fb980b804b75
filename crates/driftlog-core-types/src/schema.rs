//! Canonical schema constants for structured logging and events
//!
//! `tracing` macros take field names as literal identifiers, so the
//! `log_op_*` macros and the `cycle`/`identity` spans spell these out; the
//! constants are what readers of captured or exported events look them up by.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Span fields
pub const FIELD_CYCLE_ID: &str = "cycle_id";
pub const FIELD_IDENTITY: &str = "identity";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
