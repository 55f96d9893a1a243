//! Canonical logging macros
//!
//! Field keys and event names come from `docrel_core_types::schema`, so log
//! consumers can rely on `component`, `op` and `event` being present.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use docrel_core::log_op_start;
/// log_op_start!("save");
/// log_op_start!("save", model = "User");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use docrel_core::log_op_end;
/// log_op_end!("save", duration_ms = 3);
/// log_op_end!("save", duration_ms = 3, model = "User");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error with its stable error code
///
/// `$err` is anything convertible into `ExError`.
///
/// # Example
///
/// ```
/// # use docrel_core::log_op_error;
/// # use docrel_core::errors::DocRelError;
/// let err = DocRelError::UnknownModel { model: "Ghost".to_string() };
/// log_op_error!("find", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            $($field)*
        );
    }};
}

/// Log a document passed over by a best-effort bulk operation
///
/// # Example
///
/// ```
/// # use docrel_core::log_op_skip;
/// # use docrel_core::errors::DocRelError;
/// let err = DocRelError::UnknownModel { model: "Ghost".to_string() };
/// log_op_skip!("nullify", err, doc_id = "u1");
/// ```
#[macro_export]
macro_rules! log_op_skip {
    ($op:expr, $err:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_SKIPPED,
            err_code = ex_err.code(),
            reason = %ex_err,
        );
    }};
    ($op:expr, $err:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_SKIPPED,
            err_code = ex_err.code(),
            reason = %ex_err,
            $($field)*
        );
    }};
}
