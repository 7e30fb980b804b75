//! Structured logging facility for driftlog
//!
//! - Single initialization point via `init(profile)`
//! - Operation-boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Correlation through the `cycle` and `identity` spans opened by the driver
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use driftlog_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
