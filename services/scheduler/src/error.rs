//! Error types for the scheduler service.

use skiff_constraints::ConstraintError;
use thiserror::Error;

/// Invalid or missing workload configuration.
///
/// Always raised at construction time, never while processing offers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting '{key}'")]
    Missing { key: &'static str },

    #[error("setting '{key}' is not a number: '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("setting '{key}' must be greater than zero, got {value}")]
    NotPositive { key: &'static str, value: String },

    #[error("setting '{key}' is not a boolean: '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error("invalid volume mount '{0}', expected host:container[:ro|rw]")]
    InvalidVolume(String),

    #[error("invalid constraint expression: {0}")]
    Constraints(#[from] ConstraintError),
}

/// Errors returned by a driver implementation.
///
/// The scheduler logs these and carries on; they never abort event handling.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode driver call: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("driver rejected call: {0}")]
    Rejected(String),
}
