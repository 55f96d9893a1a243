//! Document identifiers
//!
//! A document has no identity until the store persists it. Identities are
//! UUID v7 strings so that natural insertion order and id order agree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a persisted document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Generate a new DocId using UUIDv7
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (ids read back from array fields)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
