//! Top-level error reporting
//!
//! Errors that reach the application shell are logged through
//! `log_error_with_context`, which shows operators a specific message when
//! they can act on it (bad configuration, bad trigger input) and a generic
//! operation context otherwise, keeping the full detail at debug level.

/// Errors that can tell whether the operator can fix them directly.
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// True for configuration and input problems the operator can correct
    fn is_user_actionable(&self) -> bool;

    /// Operator-facing message for actionable errors
    fn user_message(&self) -> Option<String>;
}

/// Log a run-ending error at the appropriate level of detail.
///
/// # Examples
/// ```rust,no_run
/// # use asset_producer::core::error_handling::log_error_with_context;
/// # use asset_producer::app::cli::config::ConfigError;
/// let err = ConfigError::Missing { key: "scanner.endpoint".to_string() };
/// log_error_with_context(&err, "Loading configuration");
/// // Logs: "FATAL: missing required setting 'scanner.endpoint'"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Exit code for an error reaching the shell: 2 for operator mistakes,
/// 1 for everything else.
pub fn exit_code_for<E: ContextualError>(error: &E) -> i32 {
    if error.is_user_actionable() {
        2
    } else {
        1
    }
}
