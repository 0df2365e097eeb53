//! Generic error handling utilities
//!
//! Provides unified error handling that distinguishes user-actionable
//! failures (fix the config, restart) from system failures (log and carry
//! on), while keeping domain-specific logging patterns.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// User-actionable errors (validation failures, missing configuration) should
/// show their specific message; system errors (IO failures, network timeouts)
/// show generic context with detail pushed to debug level.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a specific, user-actionable message
    fn is_user_actionable(&self) -> bool;

    /// The specific user message when `is_user_actionable()` is true
    fn user_message(&self) -> Option<String>;
}

/// Log an error with appropriate detail level based on its specificity
///
/// User-actionable errors log their own message; system errors log the
/// operation context and keep the full detail at debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    if error.is_user_actionable() {
        if let Some(user_msg) = error.user_message() {
            log::error!("FATAL: {}", user_msg);
        } else {
            log::error!("FATAL: {}", operation_context);
        }
    } else {
        log::error!("FATAL: {}", operation_context);
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
