//! In-Memory Collaborators
//!
//! Key store and vault kept in process memory. Used by tests and by the
//! CLI's `--backend memory` dry runs; behaves like the real service where
//! the workflow cares (two-key quota, error codes, insertion-ordered
//! listing).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RemoteError, RemoteResult};
use crate::store::{IdentityKeyStore, KeyAdministration, SecretVault};
use crate::types::{
    AccessKeyPair, CallerIdentity, KeyId, KeyMetadata, KeyStatus, MfaDevice, Principal,
    SecretKey, SecretRecord,
};

/// Per-principal key quota enforced by the identity service
pub const DEFAULT_MAX_KEYS: usize = 2;

#[derive(Debug)]
struct StoredKey {
    metadata: KeyMetadata,
    secret: SecretKey,
}

/// In-memory identity key store
///
/// Thread-safe; shared data is guarded by a `RwLock`.
#[derive(Debug)]
pub struct MemoryKeyStore {
    keys: Arc<RwLock<HashMap<Principal, Vec<StoredKey>>>>,
    mfa: Arc<RwLock<HashMap<Principal, Vec<MfaDevice>>>>,
    sequence: AtomicU64,
    operator: Principal,
    max_keys: usize,
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new(Principal::new("local-operator"))
    }
}

impl MemoryKeyStore {
    /// Create an empty store whose ambient session belongs to `operator`
    pub fn new(operator: Principal) -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            mfa: Arc::new(RwLock::new(HashMap::new())),
            sequence: AtomicU64::new(0),
            operator,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }

    /// Override the per-principal key quota
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Seed an existing key, bypassing the quota
    pub async fn insert_key(
        &self,
        principal: &Principal,
        id: KeyId,
        created_at: DateTime<Utc>,
    ) -> AccessKeyPair {
        let pair = AccessKeyPair::new(id, generate_secret(), principal.clone(), created_at);
        let mut keys = self.keys.write().await;
        keys.entry(principal.clone()).or_default().push(StoredKey {
            metadata: pair.metadata(),
            secret: pair.secret.clone(),
        });
        pair
    }

    /// Register an MFA device
    pub async fn insert_mfa_device(
        &self,
        principal: &Principal,
        serial_number: impl Into<String>,
        enabled_at: DateTime<Utc>,
    ) {
        let mut mfa = self.mfa.write().await;
        mfa.entry(principal.clone()).or_default().push(MfaDevice {
            serial_number: serial_number.into(),
            enabled_at,
        });
    }

    /// Ids of all keys currently issued to `principal`
    pub async fn key_ids(&self, principal: &Principal) -> Vec<KeyId> {
        let keys = self.keys.read().await;
        keys.get(principal)
            .map(|stored| stored.iter().map(|k| k.metadata.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Clear all data
    pub async fn clear(&self) {
        self.keys.write().await.clear();
        self.mfa.write().await.clear();
    }

    fn next_key_id(&self) -> KeyId {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        KeyId::new(format!("AKIA{:016}", n))
    }
}

/// 40-character secret in the same alphabet the service uses
fn generate_secret() -> SecretKey {
    let mut raw = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    raw.truncate(40);
    SecretKey::new(raw)
}

#[async_trait]
impl IdentityKeyStore for MemoryKeyStore {
    async fn create_key(&self, principal: &Principal) -> RemoteResult<AccessKeyPair> {
        let mut keys = self.keys.write().await;
        let stored = keys.entry(principal.clone()).or_default();

        if stored.len() >= self.max_keys {
            return Err(RemoteError::service(
                "create_key",
                format!(
                    "LimitExceeded: cannot exceed quota for AccessKeysPerUser: {}",
                    self.max_keys
                ),
            ));
        }

        let pair = AccessKeyPair::new(
            self.next_key_id(),
            generate_secret(),
            principal.clone(),
            Utc::now(),
        );
        stored.push(StoredKey {
            metadata: pair.metadata(),
            secret: pair.secret.clone(),
        });

        Ok(pair)
    }

    async fn verify_key(&self, pair: &AccessKeyPair) -> RemoteResult<bool> {
        let keys = self.keys.read().await;
        let stored = keys
            .values()
            .flatten()
            .find(|k| k.metadata.id == pair.id)
            .ok_or_else(|| {
                RemoteError::credential(
                    "verify_key",
                    "InvalidClientTokenId: the security token included in the request is invalid",
                )
            })?;

        if stored.secret != pair.secret {
            return Err(RemoteError::credential(
                "verify_key",
                "SignatureDoesNotMatch: request signature does not match",
            ));
        }

        if stored.metadata.status != KeyStatus::Active {
            return Err(RemoteError::credential(
                "verify_key",
                "InvalidClientTokenId: the access key is inactive",
            ));
        }

        Ok(stored.metadata.owner == pair.owner)
    }

    async fn list_keys(&self, principal: &Principal) -> RemoteResult<Vec<KeyMetadata>> {
        let keys = self.keys.read().await;
        Ok(keys
            .get(principal)
            .map(|stored| stored.iter().map(|k| k.metadata.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> RemoteResult<()> {
        let mut keys = self.keys.write().await;
        let stored = keys.get_mut(principal).ok_or_else(|| {
            RemoteError::not_found("delete_key", format!("NoSuchEntity: user {}", principal))
        })?;

        let before = stored.len();
        stored.retain(|k| &k.metadata.id != key_id);
        if stored.len() == before {
            return Err(RemoteError::not_found(
                "delete_key",
                format!("NoSuchEntity: access key {}", key_id.masked()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl KeyAdministration for MemoryKeyStore {
    async fn current_identity(&self) -> RemoteResult<CallerIdentity> {
        Ok(CallerIdentity {
            principal: self.operator.clone(),
            arn: format!("arn:aws:iam::000000000000:user/{}", self.operator),
            user_id: "AIDALOCALOPERATOR000".to_string(),
        })
    }

    async fn set_key_status(
        &self,
        principal: &Principal,
        key_id: &KeyId,
        status: KeyStatus,
    ) -> RemoteResult<()> {
        let mut keys = self.keys.write().await;
        let key = keys
            .get_mut(principal)
            .and_then(|stored| stored.iter_mut().find(|k| &k.metadata.id == key_id))
            .ok_or_else(|| {
                RemoteError::not_found(
                    "set_key_status",
                    format!("NoSuchEntity: access key {}", key_id.masked()),
                )
            })?;

        key.metadata.status = status;
        Ok(())
    }

    async fn mfa_devices(&self, principal: &Principal) -> RemoteResult<Vec<MfaDevice>> {
        let mfa = self.mfa.read().await;
        Ok(mfa.get(principal).cloned().unwrap_or_default())
    }
}

/// In-memory secret vault
#[derive(Debug, Default)]
pub struct MemoryVault {
    secrets: Arc<RwLock<HashMap<String, SecretRecord>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a secret back
    pub async fn get(&self, name: &str) -> Option<SecretRecord> {
        let secrets = self.secrets.read().await;
        secrets
            .get(name)
            .map(|record| SecretRecord::from_payload(record.name.clone(), record.payload()))
    }

    pub async fn len(&self) -> usize {
        self.secrets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.secrets.read().await.is_empty()
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn put_secret(&self, name: &str, payload: &str) -> RemoteResult<()> {
        let mut secrets = self.secrets.write().await;
        secrets.insert(name.to_string(), SecretRecord::from_payload(name, payload));
        Ok(())
    }
}
