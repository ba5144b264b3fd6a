//! Rotation Error Types

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::sanitize::redact;
use crate::types::{KeyId, Principal};

/// Result of a single remote call
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Rotation result type
pub type RotationResult<T> = Result<T, RotationError>;

/// Classification of a failed remote call
///
/// Assigned by the collaborator that made the call and carried unchanged
/// through the rotation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Credentials missing, unrecognized or expired
    Credential,
    /// Caller is not authorized for the operation
    Permission,
    /// Any other service or connectivity failure
    Service,
    /// The call was cut off by the rotation deadline
    Cancelled,
    /// The addressed resource does not exist
    NotFound,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::Credential => "credential",
            RemoteErrorKind::Permission => "permission",
            RemoteErrorKind::Service => "service",
            RemoteErrorKind::Cancelled => "cancelled",
            RemoteErrorKind::NotFound => "not found",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed call to the identity service or the vault
///
/// `message` holds the raw service text; `Display` redacts it, so every
/// error rendered for logs or the operator carries masked key ids only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error in {operation}: {}", redact(.message))]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub operation: &'static str,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation,
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Credential, operation, message)
    }

    /// Create a permission error
    pub fn permission(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Permission, operation, message)
    }

    /// Create a generic service error
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Service, operation, message)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Cancelled, operation, message)
    }

    /// Create a not found error
    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, operation, message)
    }
}

/// How loudly a rotation failure must be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// New key is live and stored; cleanup incomplete
    Warning,
    /// Rotation failed; key set unchanged
    Error,
    /// Rotation failed and rollback failed; operator must intervene
    Critical,
}

/// Rotation workflow error
#[derive(Debug, Error)]
pub enum RotationError {
    /// New key could not be created; nothing changed
    #[error("failed to create new access key for {principal}: {source}")]
    CreationFailed {
        principal: Principal,
        source: RemoteError,
    },

    /// New key did not verify
    #[error("new access key {} failed verification: {source}", .key_id.masked())]
    VerificationFailed { key_id: KeyId, source: RemoteError },

    /// New key could not be written to the vault
    #[error("failed to store new access key {} in secret '{secret_name}': {source}", .key_id.masked())]
    PersistenceFailed {
        key_id: KeyId,
        secret_name: String,
        source: RemoteError,
    },

    /// Old key could not be retired; the new key is live and stored
    #[error(
        "new access key {} is active and stored, but retiring the old key failed: {source}",
        .new_key_id.masked()
    )]
    RetirementFailed {
        new_key_id: KeyId,
        old_key_id: Option<KeyId>,
        source: RemoteError,
    },

    /// Primary failure and the compensating delete also failed
    #[error(
        "{primary}; rollback also failed, access key {} is still live and must be deleted manually: {rollback}",
        .orphan_key_id.masked()
    )]
    RollbackFailed {
        primary: Box<RotationError>,
        orphan_key_id: KeyId,
        rollback: RemoteError,
    },
}

impl RotationError {
    /// Short machine-readable name of the failure
    pub fn code(&self) -> &'static str {
        match self {
            RotationError::CreationFailed { .. } => "creation_failed",
            RotationError::VerificationFailed { .. } => "verification_failed",
            RotationError::PersistenceFailed { .. } => "persistence_failed",
            RotationError::RetirementFailed { .. } => "retirement_failed",
            RotationError::RollbackFailed { .. } => "rollback_failed",
        }
    }

    /// Classification of the remote failure that started it all
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RotationError::CreationFailed { source, .. }
            | RotationError::VerificationFailed { source, .. }
            | RotationError::PersistenceFailed { source, .. }
            | RotationError::RetirementFailed { source, .. } => source.kind,
            RotationError::RollbackFailed { primary, .. } => primary.kind(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RotationError::RetirementFailed { .. } => Severity::Warning,
            RotationError::RollbackFailed { .. } => Severity::Critical,
            _ => Severity::Error,
        }
    }

    /// Two keys are live and nothing will clean up automatically
    pub fn requires_manual_intervention(&self) -> bool {
        matches!(self, RotationError::RollbackFailed { .. })
    }

    /// Key left behind by a failed rollback
    pub fn orphan_key_id(&self) -> Option<&KeyId> {
        match self {
            RotationError::RollbackFailed { orphan_key_id, .. } => Some(orphan_key_id),
            _ => None,
        }
    }

    /// The failure that triggered compensation (self for non-compound errors)
    pub fn primary(&self) -> &RotationError {
        match self {
            RotationError::RollbackFailed { primary, .. } => primary.as_ref(),
            other => other,
        }
    }
}
