//! Operation boundary macros
//!
//! Every save boundary carries `component`, `op` and `event` so a captured
//! log can be filtered by operation without parsing messages. Error events
//! also lift the failing table and row id out of the [`ExError`] context.
//!
//! [`ExError`]: crate::errors::ExError

#[doc(hidden)]
pub mod __private {
    pub use instructa_core_types::schema;
    pub use tracing;
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_boundary {
    ($level:ident, $op:expr, $event:ident $(, $($field:tt)*)?) => {
        $crate::logging_facility::macros::__private::tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::macros::__private::schema::$event,
            $($($field)*)?
        )
    };
}

/// Log the start of an operation, with optional extra fields
///
/// ```
/// # use instructa_core::log_op_start;
/// log_op_start!("save_project_data");
/// log_op_start!("save_project_data", entities = 3, rows = 12);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_boundary!(info, $op, EVENT_START $(, $($field)*)?)
    };
}

/// Log the successful end of an operation; `duration_ms` is required
///
/// ```
/// # use instructa_core::log_op_end;
/// log_op_end!("save_project_data", duration_ms = 12, rows_upserted = 4);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_boundary!(
            info, $op, EVENT_END, duration_ms = $duration $(, $($field)*)?
        )
    };
}

/// Log a failed operation
///
/// Accepts anything convertible into [`ExError`](crate::errors::ExError).
/// The error's table and entity id, when set, become `err_table` and
/// `err_entity_id`.
///
/// ```
/// # use instructa_core::log_op_error;
/// # use instructa_core::errors::InstructaError;
/// let err = InstructaError::Storage { message: "disk full".to_string() };
/// log_op_error!("save_project_data", err, duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__log_op_boundary!(
            error, $op, EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_table = ex_err.table(),
            err_entity_id = ex_err.entity_id(),
            err_message = %ex_err
            $(, $($field)*)?
        );
    }};
}
