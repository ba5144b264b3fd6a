//! Integration tests for the key rotation workflow
//!
//! The collaborators are in-memory stores wrapped in a recording layer that
//! logs every call and can inject failures.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use keyrot_core::{
    AccessKeyPair, IdentityKeyStore, KeyId, KeyMetadata, KeyRotationCoordinator, MemoryKeyStore,
    MemoryVault, Phase, Principal, RemoteError, RemoteErrorKind, RemoteResult, RetirePolicy,
    RotationConfig, RotationError, SecretVault, Severity, VerifyPolicy,
};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SECRET_NAME: &str = "vault/alice-key";
const K1: &str = "AKIAOLDKEY0000000001";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Create,
    Verify,
    List,
    Delete(KeyId),
    Put(String),
}

type CallLog = Arc<Mutex<Vec<Call>>>;

struct RecordingKeyStore {
    inner: MemoryKeyStore,
    log: CallLog,
    create_error: Option<RemoteError>,
    verify_script: Mutex<VecDeque<RemoteResult<bool>>>,
    delete_error: Option<RemoteError>,
    hang_verify: bool,
    hang_delete: bool,
}

impl RecordingKeyStore {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IdentityKeyStore for RecordingKeyStore {
    async fn create_key(&self, principal: &Principal) -> RemoteResult<AccessKeyPair> {
        self.record(Call::Create);
        match &self.create_error {
            Some(err) => Err(err.clone()),
            None => self.inner.create_key(principal).await,
        }
    }

    async fn verify_key(&self, pair: &AccessKeyPair) -> RemoteResult<bool> {
        self.record(Call::Verify);
        if self.hang_verify {
            std::future::pending::<()>().await;
        }
        let scripted = self.verify_script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => self.inner.verify_key(pair).await,
        }
    }

    async fn list_keys(&self, principal: &Principal) -> RemoteResult<Vec<KeyMetadata>> {
        self.record(Call::List);
        self.inner.list_keys(principal).await
    }

    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> RemoteResult<()> {
        self.record(Call::Delete(key_id.clone()));
        if self.hang_delete {
            std::future::pending::<()>().await;
        }
        match &self.delete_error {
            Some(err) => Err(err.clone()),
            None => self.inner.delete_key(principal, key_id).await,
        }
    }
}

struct RecordingVault {
    inner: MemoryVault,
    log: CallLog,
    put_error: Option<RemoteError>,
}

#[async_trait]
impl SecretVault for RecordingVault {
    async fn put_secret(&self, name: &str, payload: &str) -> RemoteResult<()> {
        self.log.lock().unwrap().push(Call::Put(name.to_string()));
        match &self.put_error {
            Some(err) => Err(err.clone()),
            None => self.inner.put_secret(name, payload).await,
        }
    }
}

struct Harness {
    store: Arc<RecordingKeyStore>,
    vault: Arc<RecordingVault>,
    log: CallLog,
    alice: Principal,
}

impl Harness {
    /// alice starts with a single key, K1
    async fn new(configure: impl FnOnce(&mut RecordingKeyStore, &mut RecordingVault)) -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut store = RecordingKeyStore {
            inner: MemoryKeyStore::default(),
            log: log.clone(),
            create_error: None,
            verify_script: Mutex::new(VecDeque::new()),
            delete_error: None,
            hang_verify: false,
            hang_delete: false,
        };
        let mut vault = RecordingVault {
            inner: MemoryVault::new(),
            log: log.clone(),
            put_error: None,
        };
        configure(&mut store, &mut vault);

        let alice = Principal::new("alice");
        store
            .inner
            .insert_key(
                &alice,
                KeyId::new(K1),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )
            .await;

        Self {
            store: Arc::new(store),
            vault: Arc::new(vault),
            log,
            alice,
        }
    }

    fn coordinator(&self, config: RotationConfig) -> KeyRotationCoordinator {
        KeyRotationCoordinator::new(self.store.clone(), self.vault.clone(), config)
    }

    async fn rotate(&self, config: RotationConfig) -> Result<keyrot_core::RotationReport, RotationError> {
        self.coordinator(config).rotate(&self.alice, SECRET_NAME).await
    }

    async fn key_ids(&self) -> Vec<KeyId> {
        self.store.inner.key_ids(&self.alice).await
    }

    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }
}

/// Formatted tracing output collected in memory
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn fast_config() -> RotationConfig {
    RotationConfig::default().with_verify(VerifyPolicy::once())
}

fn k1() -> KeyId {
    KeyId::new(K1)
}

// ============ Successful Rotation ============

#[tokio::test]
async fn test_rotation_replaces_old_key() {
    let h = Harness::new(|_, _| {}).await;

    let report = h.rotate(fast_config()).await.unwrap();

    assert_eq!(report.phase, Phase::OldRetired);
    assert_eq!(report.retired_key_id, Some(k1()));
    assert_eq!(report.secret_name, SECRET_NAME);
    assert_eq!(h.key_ids().await, vec![report.new_key_id.clone()]);
}

#[tokio::test]
async fn test_vault_holds_new_key_material() {
    let h = Harness::new(|_, _| {}).await;

    let report = h.rotate(fast_config()).await.unwrap();

    let record = h.vault.inner.get(SECRET_NAME).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(record.payload()).unwrap();
    assert_eq!(value["AccessKeyId"], report.new_key_id.as_str());

    let (id, secret) = record.decode().unwrap();
    assert_eq!(id, report.new_key_id);
    assert_eq!(secret.len(), 40);

    // The stored secret is the one that actually signs for the new key
    let stored = AccessKeyPair::new(id, secret, h.alice.clone(), Utc::now());
    assert!(h.store.inner.verify_key(&stored).await.unwrap());
}

#[tokio::test]
async fn test_steps_run_in_order() {
    let h = Harness::new(|_, _| {}).await;

    h.rotate(fast_config()).await.unwrap();

    assert_eq!(
        h.calls(),
        vec![
            Call::Create,
            Call::Verify,
            Call::Put(SECRET_NAME.to_string()),
            Call::List,
            Call::Delete(k1()),
        ]
    );
}

#[tokio::test]
async fn test_old_key_deleted_only_after_persist() {
    let h = Harness::new(|_, _| {}).await;

    h.rotate(fast_config()).await.unwrap();

    let put = h.position(&Call::Put(SECRET_NAME.to_string())).unwrap();
    let delete_old = h.position(&Call::Delete(k1())).unwrap();
    assert!(put < delete_old);
}

#[tokio::test]
async fn test_second_rotation_overwrites_secret() {
    let h = Harness::new(|_, _| {}).await;

    let first = h.rotate(fast_config()).await.unwrap();
    let second = h.rotate(fast_config()).await.unwrap();

    assert_eq!(second.retired_key_id, Some(first.new_key_id));
    assert_eq!(h.key_ids().await, vec![second.new_key_id.clone()]);
    assert_eq!(h.vault.inner.len().await, 1);

    let (id, _) = h.vault.inner.get(SECRET_NAME).await.unwrap().decode().unwrap();
    assert_eq!(id, second.new_key_id);
}

// ============ Creation Failures ============

#[tokio::test]
async fn test_creation_failure_keeps_classification() {
    let h = Harness::new(|store, _| {
        store.create_error = Some(RemoteError::permission(
            "create_key",
            "AccessDenied: not authorized to perform iam:CreateAccessKey",
        ));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    assert!(matches!(err, RotationError::CreationFailed { .. }));
    assert_eq!(err.kind(), RemoteErrorKind::Permission);
    assert_eq!(h.calls(), vec![Call::Create]);
    assert_eq!(h.key_ids().await, vec![k1()]);
}

// ============ Verification Failures ============

#[tokio::test]
async fn test_verify_false_rolls_back() {
    let h = Harness::new(|store, _| {
        store.verify_script.lock().unwrap().push_back(Ok(false));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    assert!(matches!(err, RotationError::VerificationFailed { .. }));
    assert_eq!(err.severity(), Severity::Error);
    assert_eq!(h.key_ids().await, vec![k1()]);
    assert!(h.vault.inner.is_empty().await);
    assert!(!h.calls().iter().any(|c| matches!(c, Call::Put(_))));
}

#[tokio::test]
async fn test_verify_error_rolls_back_new_key() {
    let h = Harness::new(|store, _| {
        store
            .verify_script
            .lock()
            .unwrap()
            .push_back(Err(RemoteError::credential("verify_key", "InvalidClientTokenId")));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    assert_eq!(err.kind(), RemoteErrorKind::Credential);
    assert_eq!(h.key_ids().await, vec![k1()]);

    let deletes: Vec<_> = h
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Delete(_)))
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_ne!(deletes[0], Call::Delete(k1()));
}

#[tokio::test]
async fn test_rollback_failure_is_reported_distinctly() {
    let h = Harness::new(|store, _| {
        store.verify_script.lock().unwrap().push_back(Ok(false));
        store.delete_error = Some(RemoteError::service("delete_key", "connection reset"));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    assert!(matches!(err, RotationError::RollbackFailed { .. }));
    assert_eq!(err.severity(), Severity::Critical);
    assert!(err.requires_manual_intervention());
    assert_eq!(err.primary().code(), "verification_failed");

    let ids = h.key_ids().await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&k1()));
    assert!(ids.contains(err.orphan_key_id().unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_verify_retries_until_key_propagates() {
    let h = Harness::new(|store, _| {
        let mut script = store.verify_script.lock().unwrap();
        script.push_back(Err(RemoteError::credential("verify_key", "InvalidClientTokenId")));
        script.push_back(Err(RemoteError::credential("verify_key", "InvalidClientTokenId")));
    })
    .await;

    let report = h.rotate(RotationConfig::default()).await.unwrap();

    let verifies = h.calls().iter().filter(|c| **c == Call::Verify).count();
    assert_eq!(verifies, 3);
    assert_eq!(h.key_ids().await, vec![report.new_key_id]);
}

#[tokio::test(start_paused = true)]
async fn test_verify_permission_error_is_not_retried() {
    let h = Harness::new(|store, _| {
        store
            .verify_script
            .lock()
            .unwrap()
            .push_back(Err(RemoteError::permission("verify_key", "AccessDenied")));
    })
    .await;

    let err = h.rotate(RotationConfig::default()).await.unwrap_err();

    assert_eq!(err.kind(), RemoteErrorKind::Permission);
    let verifies = h.calls().iter().filter(|c| **c == Call::Verify).count();
    assert_eq!(verifies, 1);
}

// ============ Deadline ============

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_still_rolls_back() {
    let h = Harness::new(|store, _| {
        store.hang_verify = true;
    })
    .await;

    let config = fast_config().with_deadline(Duration::from_millis(200));
    let err = h.rotate(config).await.unwrap_err();

    assert!(matches!(err, RotationError::VerificationFailed { .. }));
    assert_eq!(err.kind(), RemoteErrorKind::Cancelled);
    assert_eq!(h.key_ids().await, vec![k1()]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cuts_verify_backoff() {
    let h = Harness::new(|store, _| {
        let mut script = store.verify_script.lock().unwrap();
        for _ in 0..10 {
            script.push_back(Err(RemoteError::service("verify_key", "throttled")));
        }
    })
    .await;

    let config = RotationConfig::default()
        .with_deadline(Duration::from_secs(3))
        .with_verify(VerifyPolicy {
            attempts: 10,
            interval: Duration::from_secs(2),
        });
    let err = h.rotate(config).await.unwrap_err();

    assert_eq!(err.kind(), RemoteErrorKind::Cancelled);
    assert_eq!(h.key_ids().await, vec![k1()]);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_gets_its_own_grace_period() {
    let h = Harness::new(|store, _| {
        store.verify_script.lock().unwrap().push_back(Ok(false));
        store.hang_delete = true;
    })
    .await;

    let config = fast_config().with_rollback_grace(Duration::from_secs(1));
    let err = h.rotate(config).await.unwrap_err();

    match &err {
        RotationError::RollbackFailed { rollback, .. } => {
            assert_eq!(rollback.kind, RemoteErrorKind::Cancelled);
            assert_eq!(rollback.operation, "delete_key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.primary().code(), "verification_failed");
    assert_eq!(h.key_ids().await.len(), 2);
}

// ============ Persistence Failures ============

#[tokio::test]
async fn test_persist_failure_keeps_old_key() {
    let h = Harness::new(|_, vault| {
        vault.put_error = Some(RemoteError::permission("put_secret", "AccessDeniedException"));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    match &err {
        RotationError::PersistenceFailed { secret_name, .. } => {
            assert_eq!(secret_name, SECRET_NAME)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.kind(), RemoteErrorKind::Permission);
    assert_eq!(h.key_ids().await, vec![k1()]);
    assert!(h.position(&Call::Delete(k1())).is_none());
    assert!(h.position(&Call::List).is_none());
}

#[tokio::test]
async fn test_persist_failure_with_failed_rollback() {
    let h = Harness::new(|store, vault| {
        vault.put_error = Some(RemoteError::service("put_secret", "InternalServiceError"));
        store.delete_error = Some(RemoteError::service("delete_key", "connection reset"));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    assert!(matches!(err, RotationError::RollbackFailed { .. }));
    assert_eq!(err.severity(), Severity::Critical);
    assert_eq!(err.primary().code(), "persistence_failed");
    assert_eq!(err.kind(), RemoteErrorKind::Service);

    let orphan = err.orphan_key_id().unwrap().clone();
    let ids = h.key_ids().await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&k1()));
    assert!(ids.contains(&orphan));
    assert!(h.position(&Call::Delete(orphan)).is_some());
    assert!(h.position(&Call::Delete(k1())).is_none());
}

// ============ Retirement ============

#[tokio::test]
async fn test_retirement_failure_is_not_rolled_back() {
    let h = Harness::new(|store, _| {
        store.delete_error = Some(RemoteError::service("delete_key", "Throttling"));
    })
    .await;

    let err = h.rotate(fast_config()).await.unwrap_err();

    let new_key_id = match &err {
        RotationError::RetirementFailed {
            new_key_id,
            old_key_id,
            ..
        } => {
            assert_eq!(old_key_id.as_ref(), Some(&k1()));
            new_key_id.clone()
        }
        other => panic!("unexpected error: {:?}", other),
    };
    assert_eq!(err.severity(), Severity::Warning);

    let ids = h.key_ids().await;
    assert!(ids.contains(&k1()));
    assert!(ids.contains(&new_key_id));

    let (stored, _) = h.vault.inner.get(SECRET_NAME).await.unwrap().decode().unwrap();
    assert_eq!(stored, new_key_id);

    let deletes = h
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Delete(_)))
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn test_explicit_unknown_key_fails_retirement() {
    let h = Harness::new(|_, _| {}).await;

    let config =
        fast_config().with_retire(RetirePolicy::Explicit(KeyId::new("AKIADOESNOTEXIST0000")));
    let err = h.rotate(config).await.unwrap_err();

    assert!(matches!(err, RotationError::RetirementFailed { .. }));
    assert_eq!(err.kind(), RemoteErrorKind::NotFound);
    assert_eq!(h.key_ids().await.len(), 2);
    assert!(h.vault.inner.get(SECRET_NAME).await.is_some());
    assert!(!h.calls().iter().any(|c| matches!(c, Call::Delete(_))));
}

#[tokio::test]
async fn test_explicit_key_is_retired() {
    let h = Harness::new(|_, _| {}).await;

    let report = h
        .rotate(fast_config().with_retire(RetirePolicy::Explicit(k1())))
        .await
        .unwrap();

    assert_eq!(report.retired_key_id, Some(k1()));
}

#[tokio::test]
async fn test_oldest_policy_picks_earliest_key() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let alice = Principal::new("alice");
    let inner = MemoryKeyStore::default().with_max_keys(3);
    let newer = KeyId::new("AKIANEWERKEY00000002");
    inner
        .insert_key(&alice, newer.clone(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        .await;
    inner
        .insert_key(&alice, k1(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .await;

    let store = Arc::new(RecordingKeyStore {
        inner,
        log: log.clone(),
        create_error: None,
        verify_script: Mutex::new(VecDeque::new()),
        delete_error: None,
        hang_verify: false,
        hang_delete: false,
    });
    let vault = Arc::new(RecordingVault {
        inner: MemoryVault::new(),
        log,
        put_error: None,
    });

    let coordinator = KeyRotationCoordinator::new(
        store.clone(),
        vault,
        fast_config().with_retire(RetirePolicy::Oldest),
    );
    let report = coordinator.rotate(&alice, SECRET_NAME).await.unwrap();

    assert_eq!(report.retired_key_id, Some(k1()));
    let ids = store.inner.key_ids(&alice).await;
    assert_eq!(ids, vec![newer, report.new_key_id]);
}

// ============ Logging ============

#[tokio::test]
async fn test_logs_never_carry_raw_key_ids() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let not_found = RemoteError::not_found(
        "delete_key",
        format!("NoSuchEntity: The Access Key with id {} cannot be found", K1),
    );

    // Retirement warning
    let retire = Harness::new(|store, _| {
        store.delete_error = Some(not_found.clone());
    })
    .await;
    let err = retire.rotate(fast_config()).await.unwrap_err();
    assert_eq!(err.severity(), Severity::Warning);

    // Failed rollback
    let rollback = Harness::new(|store, _| {
        store.verify_script.lock().unwrap().push_back(Ok(false));
        store.delete_error = Some(not_found.clone());
    })
    .await;
    let err = rollback.rotate(fast_config()).await.unwrap_err();
    assert!(err.requires_manual_intervention());

    let output = logs.contents();
    assert!(output.contains("rotation finished with warnings"));
    assert!(output.contains("rollback failed"));
    assert!(output.contains("AKIA************0001"));
    assert!(!output.contains(K1));
}
