use jds_core_types::RequestId;
use thiserror::Error;

use crate::metadata::ValueKind;

/// Result type alias using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the metadata registry, the save engine, the
/// load engine or the schema installer is classified by one of these kinds.
/// Each kind maps to a stable error code usable by callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JdsErrorKind {
    // Validation
    InvalidInput,

    // Metadata
    /// Conflicting or duplicate type/field registration
    Declaration,
    /// Field id was never registered
    UnknownField,
    /// Entity type id was never registered
    UnknownType,

    // Engine
    /// Value kind mismatch while rehydrating a row
    Population,
    /// Batched execution of a save chunk failed and was rolled back
    Save,
    /// Existence probe failed (only ever logged)
    DriverProbe,
    /// Requested capability does not exist for the dialect
    Unsupported,
    /// A DDL template changed after it was applied
    ChecksumMismatch,

    // Integration/IO
    Config,
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl JdsErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            JdsErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            JdsErrorKind::Declaration => "ERR_DECLARATION",
            JdsErrorKind::UnknownField => "ERR_UNKNOWN_FIELD",
            JdsErrorKind::UnknownType => "ERR_UNKNOWN_TYPE",
            JdsErrorKind::Population => "ERR_POPULATION",
            JdsErrorKind::Save => "ERR_SAVE",
            JdsErrorKind::DriverProbe => "ERR_DRIVER_PROBE",
            JdsErrorKind::Unsupported => "ERR_UNSUPPORTED",
            JdsErrorKind::ChecksumMismatch => "ERR_CHECKSUM_MISMATCH",
            JdsErrorKind::Config => "ERR_CONFIG",
            JdsErrorKind::Io => "ERR_IO",
            JdsErrorKind::Serialization => "ERR_SERIALIZATION",
            JdsErrorKind::Persistence => "ERR_PERSISTENCE",
            JdsErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether the caller can recover by retrying the failed unit of work
    ///
    /// Only save failures are chunk-local; metadata and population errors
    /// indicate registry or data skew and abort the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JdsErrorKind::Save | JdsErrorKind::Persistence)
    }
}

/// Canonical structured error type
///
/// Carries the classification plus enough context (operation, instance
/// uuid, type/field ids, chunk index) for a caller to retry or skip the
/// failing unit of work.
#[derive(Debug, Clone)]
pub struct JdsError {
    kind: JdsErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    type_id: Option<u64>,
    field_id: Option<u64>,
    chunk_index: Option<usize>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<JdsError>>,
}

impl JdsError {
    /// Create a new error with the specified kind
    pub fn new(kind: JdsErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            type_id: None,
            field_id: None,
            chunk_index: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add instance uuid context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add entity type id context
    pub fn with_type_id(mut self, type_id: u64) -> Self {
        self.type_id = Some(type_id);
        self
    }

    /// Add field id context
    pub fn with_field_id(mut self, field_id: u64) -> Self {
        self.field_id = Some(field_id);
        self
    }

    /// Add chunk index context
    pub fn with_chunk_index(mut self, chunk_index: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: JdsError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> JdsErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the instance uuid context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the entity type id context, if any
    pub fn type_id(&self) -> Option<u64> {
        self.type_id
    }

    /// Get the field id context, if any
    pub fn field_id(&self) -> Option<u64> {
        self.field_id
    }

    /// Get the chunk index context, if any
    pub fn chunk_index(&self) -> Option<usize> {
        self.chunk_index
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&JdsError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for JdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(chunk_index) = self.chunk_index {
            write!(f, " (chunk: {})", chunk_index)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (uuid: {})", entity_id)?;
        }
        if let Some(type_id) = self.type_id {
            write!(f, " (type_id: {})", type_id)?;
        }
        if let Some(field_id) = self.field_id {
            write!(f, " (field_id: {})", field_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for JdsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Failures raised by the metadata registry and the in-memory entity model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    // ===== Declaration Errors =====
    /// Type id already registered with a different declaration
    #[error("Entity type {type_id} already registered with a conflicting declaration: {reason}")]
    ConflictingType { type_id: u64, reason: String },

    /// Field id already bound to another value kind
    #[error("Field {field_id} is bound to {existing}, cannot redeclare as {requested}")]
    FieldKindConflict {
        field_id: u64,
        existing: ValueKind,
        requested: ValueKind,
    },

    /// Parent type must be registered before its subtypes
    #[error("Entity type {type_id} names unregistered parent type {parent_id}")]
    UnknownParentType { type_id: u64, parent_id: u64 },

    // ===== Lookup Errors =====
    /// Field id never registered
    #[error("Unknown field id: {field_id}")]
    UnknownField { field_id: u64 },

    /// Entity type id never registered
    #[error("Unknown entity type id: {type_id}")]
    UnknownType { type_id: u64 },

    // ===== Population Errors =====
    /// Field id is not declared on the entity type or any ancestor
    #[error("Field {field_id} is not declared on entity type {type_id} or its ancestors")]
    UndeclaredField { type_id: u64, field_id: u64 },

    /// Value does not match the field's registered value kind
    #[error("Field {field_id} holds {expected} values, got {found}")]
    KindMismatch {
        field_id: u64,
        expected: ValueKind,
        found: ValueKind,
    },

    /// ISO temporal text could not be parsed
    #[error("Invalid {kind} value: {input}")]
    InvalidTemporal { kind: String, input: String },
}

impl ModelError {
    /// Whether this error comes from an invalid registration
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            ModelError::ConflictingType { .. }
                | ModelError::FieldKindConflict { .. }
                | ModelError::UnknownParentType { .. }
        )
    }
}

impl From<ModelError> for JdsError {
    fn from(err: ModelError) -> Self {
        let message = err.to_string();
        match err {
            ModelError::ConflictingType { type_id, .. } => JdsError::new(JdsErrorKind::Declaration)
                .with_op("register_type")
                .with_type_id(type_id)
                .with_message(message),

            ModelError::FieldKindConflict { field_id, .. } => {
                JdsError::new(JdsErrorKind::Declaration)
                    .with_op("register_type")
                    .with_field_id(field_id)
                    .with_message(message)
            }

            ModelError::UnknownParentType { type_id, .. } => {
                JdsError::new(JdsErrorKind::Declaration)
                    .with_op("register_type")
                    .with_type_id(type_id)
                    .with_message(message)
            }

            ModelError::UnknownField { field_id } => JdsError::new(JdsErrorKind::UnknownField)
                .with_op("resolve_value_kind")
                .with_field_id(field_id)
                .with_message(message),

            ModelError::UnknownType { type_id } => JdsError::new(JdsErrorKind::UnknownType)
                .with_op("type_descriptor")
                .with_type_id(type_id)
                .with_message(message),

            ModelError::UndeclaredField { type_id, field_id } => {
                JdsError::new(JdsErrorKind::Population)
                    .with_type_id(type_id)
                    .with_field_id(field_id)
                    .with_message(message)
            }

            ModelError::KindMismatch { field_id, .. } => JdsError::new(JdsErrorKind::Population)
                .with_field_id(field_id)
                .with_message(message),

            ModelError::InvalidTemporal { .. } => {
                JdsError::new(JdsErrorKind::InvalidInput).with_message(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ScalarKind;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(JdsErrorKind::Declaration.code(), "ERR_DECLARATION");
        assert_eq!(JdsErrorKind::Save.code(), "ERR_SAVE");
        assert_eq!(JdsErrorKind::Population.code(), "ERR_POPULATION");
    }

    #[test]
    fn test_display_includes_chunk_and_uuid() {
        let err = JdsError::new(JdsErrorKind::Save)
            .with_op("save")
            .with_chunk_index(3)
            .with_entity_id("u-1")
            .with_message("batch failed");
        let text = err.to_string();
        assert!(text.starts_with("[ERR_SAVE]"));
        assert!(text.contains("chunk: 3"));
        assert!(text.contains("uuid: u-1"));
    }

    #[test]
    fn test_kind_mismatch_maps_to_population() {
        let err: JdsError = ModelError::KindMismatch {
            field_id: 7,
            expected: ValueKind::Scalar(ScalarKind::Text),
            found: ValueKind::Scalar(ScalarKind::Integer),
        }
        .into();
        assert_eq!(err.kind(), JdsErrorKind::Population);
        assert_eq!(err.field_id(), Some(7));
    }

    #[test]
    fn test_only_save_errors_are_retryable() {
        assert!(JdsErrorKind::Save.is_retryable());
        assert!(!JdsErrorKind::Declaration.is_retryable());
        assert!(!JdsErrorKind::Population.is_retryable());
    }
}
