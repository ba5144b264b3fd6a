//! Classification of AWS SDK failures
//!
//! Every SDK error is mapped to a [`RemoteError`] here, once, so the
//! rotation workflow never has to look at AWS error codes.

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use keyrot_core::{RemoteError, RemoteErrorKind};
use std::error::Error as StdError;
use std::fmt::Debug;

/// Map an AWS error code to a failure class
pub fn kind_for_code(code: &str) -> RemoteErrorKind {
    match code {
        "UnrecognizedClientException"
        | "InvalidClientTokenId"
        | "SignatureDoesNotMatch"
        | "ExpiredToken"
        | "ExpiredTokenException" => RemoteErrorKind::Credential,

        "AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation" => {
            RemoteErrorKind::Permission
        }

        "NoSuchEntity" | "ResourceNotFoundException" => RemoteErrorKind::NotFound,

        _ => RemoteErrorKind::Service,
    }
}

/// Convert an SDK error into a [`RemoteError`] for `operation`
pub(crate) fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    let kind = match &err {
        // Never reached the service; the code (if any) is meaningless
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => RemoteErrorKind::Service,
        _ => err.code().map(kind_for_code).unwrap_or(RemoteErrorKind::Service),
    };

    let message = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(&err).to_string(),
    };

    RemoteError::new(kind, operation, message)
}

/// Required response member was absent
pub(crate) fn missing(operation: &'static str, member: &str) -> RemoteError {
    RemoteError::service(operation, format!("response did not include {}", member))
}
