//! Canonical schema constants for structured logging and events
//!
//! These constants keep log fields consistent between the save engine,
//! the load engine and the schema installer.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";

// Batch shape
pub const FIELD_ENTITY_COUNT: &str = "entity_count";
pub const FIELD_STATEMENT_COUNT: &str = "statement_count";
pub const FIELD_INSTANCES: &str = "instances";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
