//! Collaborator Interfaces
//!
//! The rotation workflow only talks to the outside world through these
//! traits. Implementations classify their own failures into
//! [`RemoteErrorKind`](crate::error::RemoteErrorKind); the coordinator never
//! re-derives the classification.

use async_trait::async_trait;

use crate::error::RemoteResult;
use crate::types::{
    AccessKeyPair, CallerIdentity, KeyId, KeyMetadata, KeyStatus, MfaDevice, Principal,
};

/// Access-key operations for one named principal
#[async_trait]
pub trait IdentityKeyStore: Send + Sync {
    /// Issue a new key pair
    async fn create_key(&self, principal: &Principal) -> RemoteResult<AccessKeyPair>;

    /// Confirm the pair resolves to its owner
    ///
    /// Must use a session scoped to exactly `pair`'s credentials, never the
    /// caller's ambient session. `Ok(false)` means the call went through but
    /// the identity did not match.
    async fn verify_key(&self, pair: &AccessKeyPair) -> RemoteResult<bool>;

    /// Keys currently issued, in whatever order the service returns them
    async fn list_keys(&self, principal: &Principal) -> RemoteResult<Vec<KeyMetadata>>;

    /// Permanently delete a key
    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> RemoteResult<()>;
}

/// Key administration beyond rotation, used by the command surface
#[async_trait]
pub trait KeyAdministration: IdentityKeyStore {
    /// Identity of the ambient session
    async fn current_identity(&self) -> RemoteResult<CallerIdentity>;

    /// Activate or deactivate a key without deleting it
    async fn set_key_status(
        &self,
        principal: &Principal,
        key_id: &KeyId,
        status: KeyStatus,
    ) -> RemoteResult<()>;

    /// MFA devices registered to `principal` (read-only)
    async fn mfa_devices(&self, principal: &Principal) -> RemoteResult<Vec<MfaDevice>>;
}

/// Named secret storage
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Create or overwrite the secret `name`
    async fn put_secret(&self, name: &str, payload: &str) -> RemoteResult<()>;
}
