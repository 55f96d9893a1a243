//! Structured logging facility for docrel
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`,
//!   `log_op_error!`, `log_op_skip!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use docrel_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Session and proxy mutations own their start/end logging. The store and
//! the query layer stay silent apart from `tracing::debug!`.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
