//! Logging and observability
//!
//! Structured logging on `tracing`, with a console layer and an optional
//! rolling JSON file. The macros below keep field names consistent across
//! the dispatch path so log queries can rely on them.
//!
//! ```no_run
//! use bakesync::config::LoggingConfig;
//! use bakesync::logging::init_logging;
//!
//! let _guard = init_logging("info", &LoggingConfig::default()).expect("logging");
//! tracing::info!(outlet = "204", "Fetching actions");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the outcome of a JDE dispatch
///
/// ```no_run
/// use bakesync::log_dispatch_outcome;
///
/// log_dispatch_outcome!("B_FLOUR_L1_V1_2.5", 201u16, true);
/// ```
#[macro_export]
macro_rules! log_dispatch_outcome {
    ($transaction_id:expr, $status:expr, $success:expr) => {
        if $success {
            tracing::info!(
                transaction_id = %$transaction_id,
                status = $status,
                "Dispatched transaction to JDE"
            );
        } else {
            tracing::warn!(
                transaction_id = %$transaction_id,
                status = $status,
                "JDE rejected transaction"
            );
        }
    };
}

/// Log an error with context
///
/// ```no_run
/// use bakesync::log_error_with_context;
/// use bakesync::domain::SyncError;
///
/// let error = SyncError::Storage("bucket missing".to_string());
/// log_error_with_context!(&error, "Failed to archive dispatch");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// ```no_run
/// use bakesync::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
