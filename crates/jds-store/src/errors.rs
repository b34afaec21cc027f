//! Error handling for jds-store
//!
//! Wraps jds-core JdsError with store-specific helpers

use jds_core::errors::{JdsError, JdsErrorKind};

use crate::dialect::DialectKind;

/// Result type alias using JdsError
pub type Result<T> = std::result::Result<T, JdsError>;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> JdsError {
    JdsError::new(JdsErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> JdsError {
    JdsError::new(JdsErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Wrap a failure inside a save chunk
///
/// The chunk has been rolled back when this error reaches the caller.
pub fn save_error(chunk_index: usize, uuid: Option<&str>, source: JdsError) -> JdsError {
    let mut err = JdsError::new(JdsErrorKind::Save)
        .with_op("save")
        .with_chunk_index(chunk_index)
        .with_message(format!("chunk {} rolled back", chunk_index));
    if let Some(uuid) = uuid.or(source.entity_id()) {
        err = err.with_entity_id(uuid.to_string());
    }
    err.with_source(source)
}

/// Create a population error for a row that does not fit its field
pub fn population_error(uuid: &str, field_id: u64, reason: &str) -> JdsError {
    JdsError::new(JdsErrorKind::Population)
        .with_op("load")
        .with_entity_id(uuid.to_string())
        .with_field_id(field_id)
        .with_message(reason.to_string())
}

/// Create an error for a capability the dialect lacks
pub fn unsupported(dialect: DialectKind, what: &str) -> JdsError {
    JdsError::new(JdsErrorKind::Unsupported)
        .with_message(format!("{} does not support {}", dialect, what))
}

/// Create a template checksum mismatch error
pub fn checksum_mismatch(template: &str, expected: &str, actual: &str) -> JdsError {
    JdsError::new(JdsErrorKind::ChecksumMismatch)
        .with_op("install_templates")
        .with_message(format!(
            "Checksum mismatch for template {}: expected {}, got {}",
            template, expected, actual
        ))
}

/// Create an error for a value the codec cannot carry
pub fn codec_error(message: impl Into<String>) -> JdsError {
    JdsError::new(JdsErrorKind::Serialization)
        .with_op("codec")
        .with_message(message)
}
