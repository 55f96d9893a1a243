//! Core types shared across docrel crates
//!
//! This crate provides the leaf types used by the association layer,
//! the reference store and the logging facility:
//!
//! - **Identifiers**: `DocId`, the stable identity a store assigns on insert
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;

pub use ids::DocId;
