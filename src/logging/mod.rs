//! Logging and observability
//!
//! Structured logging through `tracing`, with:
//! - Human-readable or JSON console output
//! - Configurable log levels
//! - Optional JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use carelink::logging::init_logging;
//! use carelink::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(episode_id = "ep-1", "Episode started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a resource state transition
///
/// # Example
///
/// ```no_run
/// use carelink::log_transition;
/// use carelink::domain::EpisodeId;
///
/// let episode_id = EpisodeId::new("ep-123").unwrap();
/// log_transition!("EpisodeOfCare", &episode_id, "active", "finished");
/// ```
#[macro_export]
macro_rules! log_transition {
    ($resource_type:expr, $id:expr, $from:expr, $to:expr) => {
        tracing::info!(
            resource_type = $resource_type,
            id = %$id,
            from = $from,
            to = $to,
            "State transition"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use carelink::log_error_with_context;
/// use carelink::domain::CarelinkError;
///
/// let error = CarelinkError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = %$context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use carelink::log_retry_attempt;
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
