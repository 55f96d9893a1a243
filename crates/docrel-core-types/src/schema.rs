//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_MODEL: &str = "model";
pub const FIELD_DOC_ID: &str = "doc_id";
pub const FIELD_ASSOCIATION: &str = "association";

// Collection sizes
pub const FIELD_TARGET_LEN: &str = "target_len";
pub const FIELD_PENDING_LEN: &str = "pending_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
/// A best-effort bulk operation passed over one document
pub const EVENT_SKIPPED: &str = "skipped";
