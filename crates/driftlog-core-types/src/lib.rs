//! Core types shared across driftlog facilities
//!
//! This crate provides foundational types used by the error, logging and
//! configuration layers:
//!
//! - **Correlation types**: CycleId
//! - **Sensitive data**: Sensitive<T> marker for automatic redaction
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::CycleId;
pub use sensitive::Sensitive;
