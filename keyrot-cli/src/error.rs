//! CLI Error Types
//!
//! Error types for the keyrot CLI application.

use keyrot_core::{redact, RemoteError, RemoteErrorKind, RotationError, SanitizeError, Severity};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A single remote call failed
    #[error("{0}")]
    RemoteError(#[from] RemoteError),

    /// Rotation workflow failed
    #[error("Rotation failed: {0}")]
    RotationError(RotationError),

    /// New key is live and stored, but the old key was not retired
    #[error("{0}")]
    RotationWarning(RotationError),

    /// An MFA device is past its replacement age
    #[error("MFA device {serial_number} is {age_days} days old; replace devices older than {max_days} days")]
    MfaRotationDue {
        serial_number: String,
        age_days: i64,
        max_days: i64,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl From<RotationError> for CliError {
    fn from(err: RotationError) -> Self {
        match err.severity() {
            Severity::Warning => CliError::RotationWarning(err),
            Severity::Error | Severity::Critical => CliError::RotationError(err),
        }
    }
}

impl From<SanitizeError> for CliError {
    fn from(err: SanitizeError) -> Self {
        CliError::invalid_arg(err.to_string())
    }
}

impl CliError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Completed with a warning rather than failed
    pub fn is_warning(&self) -> bool {
        matches!(self, CliError::RotationWarning(_) | CliError::MfaRotationDue { .. })
    }

    /// Message safe to show the operator (key ids masked, secrets removed)
    pub fn redacted(&self) -> String {
        redact(&self.to_string())
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::RemoteError(err) => kind_exit_code(err.kind),
            CliError::MfaRotationDue { .. } => 6,
            CliError::RotationError(err) | CliError::RotationWarning(err) => match err {
                RotationError::RetirementFailed { .. } => 11,
                RotationError::RollbackFailed { .. } => 12,
                _ => 10,
            },
            CliError::JsonError(_) => 21,
        }
    }
}

fn kind_exit_code(kind: RemoteErrorKind) -> i32 {
    match kind {
        RemoteErrorKind::Credential => 3,
        RemoteErrorKind::Permission => 4,
        RemoteErrorKind::Service | RemoteErrorKind::Cancelled | RemoteErrorKind::NotFound => 5,
    }
}
