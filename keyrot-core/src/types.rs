//! Core Types
//!
//! Principals, access-key identifiers and key material, plus the record
//! written to the vault.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::sanitize::{self, SanitizeResult};

/// IAM principal (user name) whose keys are managed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create without validation
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Parse and validate a user name
    pub fn parse(name: &str) -> SanitizeResult<Self> {
        sanitize::validate_principal(name).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access key identifier
///
/// Stable for the life of the key. `Display` prints the full id; use
/// [`KeyId::masked`] anywhere the id ends up in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse and validate an access key id
    pub fn parse(id: &str) -> SanitizeResult<Self> {
        sanitize::validate_key_id(id).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id with everything but the first and last four characters masked
    pub fn masked(&self) -> String {
        sanitize::mask_key_id(&self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret half of an access key pair
///
/// Zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret (use with caution)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED {} chars])", self.0.len())
    }
}

/// Key status as reported by the identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Key can sign requests
    Active,
    /// Key exists but is disabled
    Inactive,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshly issued access key pair
///
/// The only moment the secret is ever visible is right after creation;
/// it cannot be re-derived later.
#[derive(Debug, Clone)]
pub struct AccessKeyPair {
    pub id: KeyId,
    pub secret: SecretKey,
    pub owner: Principal,
    pub created_at: DateTime<Utc>,
}

impl AccessKeyPair {
    pub fn new(id: KeyId, secret: SecretKey, owner: Principal, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            secret,
            owner,
            created_at,
        }
    }

    /// Metadata view of this pair (no secret)
    pub fn metadata(&self) -> KeyMetadata {
        KeyMetadata {
            id: self.id.clone(),
            owner: self.owner.clone(),
            status: KeyStatus::Active,
            created_at: Some(self.created_at),
        }
    }
}

/// Listed key, without secret material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub id: KeyId,
    pub owner: Principal,
    pub status: KeyStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// Identity the caller's ambient session resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub principal: Principal,
    pub arn: String,
    pub user_id: String,
}

impl CallerIdentity {
    /// Account id parsed from the ARN (`arn:aws:iam::<account>:user/<name>`)
    pub fn account_id(&self) -> &str {
        match self.arn.split(':').nth(4) {
            Some(account) if !account.is_empty() => account,
            _ => "unknown",
        }
    }
}

/// Age after which an MFA device should be re-enrolled
pub const MFA_MAX_AGE_DAYS: i64 = 90;

/// MFA device registered to a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaDevice {
    /// Device ARN or hardware serial
    pub serial_number: String,
    pub enabled_at: DateTime<Utc>,
}

impl MfaDevice {
    /// Whole days since enrollment
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.enabled_at).num_days()
    }

    /// Enrolled more than [`MFA_MAX_AGE_DAYS`] ago
    pub fn needs_rotation(&self, now: DateTime<Utc>) -> bool {
        now - self.enabled_at > Duration::days(MFA_MAX_AGE_DAYS)
    }
}

/// Vault payload wire format
///
/// Other tooling reads this shape back, so the field names are fixed.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "PascalCase")]
struct VaultPayload {
    access_key_id: String,
    secret_access_key: String,
}

/// Named secret blob holding serialized key material
pub struct SecretRecord {
    pub name: String,
    payload: SecretKey,
}

impl SecretRecord {
    /// Serialize a key pair into the vault wire format
    pub fn for_key(name: impl Into<String>, pair: &AccessKeyPair) -> serde_json::Result<Self> {
        let payload = VaultPayload {
            access_key_id: pair.id.as_str().to_string(),
            secret_access_key: pair.secret.expose().to_string(),
        };
        Ok(Self {
            name: name.into(),
            payload: SecretKey::new(serde_json::to_string(&payload)?),
        })
    }

    /// Wrap a payload read back from a vault
    pub fn from_payload(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: SecretKey::new(payload),
        }
    }

    /// Serialized payload (contains the secret)
    pub fn payload(&self) -> &str {
        self.payload.expose()
    }

    /// Decode the payload back into an id and secret
    pub fn decode(&self) -> serde_json::Result<(KeyId, SecretKey)> {
        let mut payload: VaultPayload = serde_json::from_str(self.payload.expose())?;
        let id = KeyId::new(std::mem::take(&mut payload.access_key_id));
        let secret = SecretKey::new(std::mem::take(&mut payload.secret_access_key));
        Ok((id, secret))
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("name", &self.name)
            .field("payload", &"[REDACTED]")
            .finish()
    }
}
