//! keyrot AWS - IAM, STS and Secrets Manager collaborators
//!
//! Implements the `keyrot-core` collaborator traits against AWS:
//!
//! - [`IamKeyStore`] - access keys via IAM, verification via STS
//!   `GetCallerIdentity` signed with the new key only
//! - [`SecretsManagerVault`] - create-or-overwrite named secrets
//! - [`AwsSession`] - shared configuration (profile, region)
//!
//! All SDK failures are classified into `RemoteErrorKind` by [`error`].

pub mod error;
pub mod iam;
pub mod secrets;
pub mod session;

pub use error::kind_for_code;
pub use iam::{arn_names_user, IamKeyStore};
pub use secrets::SecretsManagerVault;
pub use session::AwsSession;
