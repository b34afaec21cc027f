//! Canonical logging macros
//!
//! Every engine operation logs a `start` event and exactly one of `end` or
//! `end_error`, tagged with the calling module as `component`.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use jds_core::log_op_start;
/// log_op_start!("save");
/// log_op_start!("save", entity_count = 3);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = jds_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = jds_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use jds_core::log_op_end;
/// log_op_end!("save", duration_ms = 42);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = jds_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = jds_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// Accepts anything convertible into `JdsError`.
///
/// # Example
///
/// ```
/// # use jds_core::log_op_error;
/// # use jds_core::errors::ModelError;
/// let err = ModelError::UnknownField { field_id: 9 };
/// log_op_error!("load", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let jds_err: $crate::errors::JdsError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = jds_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?jds_err.kind(),
            err_code = jds_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let jds_err: $crate::errors::JdsError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = jds_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?jds_err.kind(),
            err_code = jds_err.code(),
            $($field)*
        );
    }};
}
