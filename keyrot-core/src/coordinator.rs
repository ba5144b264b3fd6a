//! Key Rotation Coordinator
//!
//! Drives create → verify → persist → retire for one principal, with a
//! compensating delete of the new key when verification or persistence
//! fails. No destructive call is made before the new key is both verified
//! and stored.
//!
//! Concurrent rotations for the same principal are not serialized here;
//! callers must hold an external lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{RetirePolicy, RotationConfig};
use crate::error::{
    RemoteError, RemoteErrorKind, RemoteResult, RotationError, RotationResult, Severity,
};
use crate::phase::{Action, Phase, RotationAttempt, Step, StepOutcome};
use crate::store::{IdentityKeyStore, SecretVault};
use crate::types::{AccessKeyPair, KeyId, Principal, SecretRecord};

/// Successful rotation summary
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub attempt_id: Uuid,
    pub principal: Principal,
    pub secret_name: String,
    pub new_key_id: KeyId,
    /// `None` when the principal had no other key
    pub retired_key_id: Option<KeyId>,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Key rotation coordinator
pub struct KeyRotationCoordinator {
    keys: Arc<dyn IdentityKeyStore>,
    vault: Arc<dyn SecretVault>,
    config: RotationConfig,
}

impl KeyRotationCoordinator {
    /// Create a coordinator over the given collaborators
    pub fn new(
        keys: Arc<dyn IdentityKeyStore>,
        vault: Arc<dyn SecretVault>,
        config: RotationConfig,
    ) -> Self {
        Self { keys, vault, config }
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Rotate `principal`'s access key and store the new one under `secret_name`
    pub async fn rotate(
        &self,
        principal: &Principal,
        secret_name: &str,
    ) -> RotationResult<RotationReport> {
        let mut attempt = RotationAttempt::new(principal.clone(), secret_name);
        let span = info_span!(
            "rotation",
            attempt_id = %attempt.attempt_id,
            principal = %principal,
            secret_name = %secret_name,
        );

        self.drive(&mut attempt).instrument(span).await
    }

    async fn drive(&self, attempt: &mut RotationAttempt) -> RotationResult<RotationReport> {
        let deadline = Instant::now() + self.config.deadline;
        let mut outcome: RotationResult<()> = Ok(());

        info!("starting key rotation");

        loop {
            let step_outcome = match outcome {
                Ok(()) => StepOutcome::Succeeded,
                Err(_) => StepOutcome::Failed,
            };

            match (attempt.next_action(step_outcome), outcome) {
                (Action::Run(step), _) => {
                    debug!(phase = %attempt.phase, step = %step, "running step");
                    outcome = self.run_step(step, attempt, deadline).await;
                    if outcome.is_ok() {
                        attempt.advance(step);
                    }
                }
                (Action::Complete, _) => {
                    let report = self.report(attempt);
                    info!(
                        new_key_id = %report.new_key_id.masked(),
                        retired_key_id = ?report.retired_key_id.as_ref().map(KeyId::masked),
                        "key rotation complete"
                    );
                    return Ok(report);
                }
                (Action::Compensate, Err(primary)) => {
                    return Err(self.compensate(attempt, primary).await);
                }
                (Action::Abort, Err(err)) => {
                    if err.severity() == Severity::Warning {
                        warn!(phase = %attempt.phase, error = %err, "rotation finished with warnings");
                    } else {
                        warn!(phase = %attempt.phase, error = %err, "rotation failed");
                    }
                    return Err(err);
                }
                (Action::Compensate | Action::Abort, Ok(())) => {
                    unreachable!("failure action without a failed step")
                }
            }
        }
    }

    async fn run_step(
        &self,
        step: Step,
        attempt: &mut RotationAttempt,
        deadline: Instant,
    ) -> RotationResult<()> {
        match step {
            Step::Create => self.create(attempt, deadline).await,
            Step::Verify => self.verify(attempt, deadline).await,
            Step::Persist => self.persist(attempt, deadline).await,
            Step::Retire => self.retire(attempt, deadline).await,
        }
    }

    async fn create(&self, attempt: &mut RotationAttempt, deadline: Instant) -> RotationResult<()> {
        let pair = bounded(deadline, "create_key", self.keys.create_key(&attempt.principal))
            .await
            .map_err(|source| RotationError::CreationFailed {
                principal: attempt.principal.clone(),
                source,
            })?;

        info!(key_id = %pair.id.masked(), "created new access key");
        attempt.new_key = Some(pair);
        Ok(())
    }

    async fn verify(&self, attempt: &mut RotationAttempt, deadline: Instant) -> RotationResult<()> {
        let pair = created_key(attempt);
        let policy = self.config.verify;
        let attempts = policy.attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;

            let err = match bounded(deadline, "verify_key", self.keys.verify_key(pair)).await {
                Ok(true) => {
                    info!(key_id = %pair.id.masked(), tries, "new access key verified");
                    return Ok(());
                }
                Ok(false) => {
                    // Wrong identity; never retried
                    let err = RemoteError::credential(
                        "verify_key",
                        format!("new key does not resolve to principal {}", pair.owner),
                    );
                    return Err(verification_failed(pair, err));
                }
                Err(err) => err,
            };

            let retryable = matches!(err.kind, RemoteErrorKind::Credential | RemoteErrorKind::Service);
            if !retryable || tries >= attempts {
                return Err(verification_failed(pair, err));
            }

            debug!(tries, error = %err, "verification not yet successful, retrying");
            if timeout_at(deadline, sleep(policy.interval)).await.is_err() {
                let err = RemoteError::cancelled("verify_key", "rotation deadline elapsed");
                return Err(verification_failed(pair, err));
            }
        }
    }

    async fn persist(&self, attempt: &mut RotationAttempt, deadline: Instant) -> RotationResult<()> {
        let pair = created_key(attempt);
        let persistence_failed = |source: RemoteError| RotationError::PersistenceFailed {
            key_id: pair.id.clone(),
            secret_name: attempt.secret_name.clone(),
            source,
        };

        let record = SecretRecord::for_key(attempt.secret_name.as_str(), pair)
            .map_err(|e| persistence_failed(RemoteError::service("encode_payload", e.to_string())))?;

        bounded(deadline, "put_secret", self.vault.put_secret(&record.name, record.payload()))
            .await
            .map_err(persistence_failed)?;

        info!(secret_name = %attempt.secret_name, "stored new access key");
        Ok(())
    }

    async fn retire(&self, attempt: &mut RotationAttempt, deadline: Instant) -> RotationResult<()> {
        let new_key_id = created_key(attempt).id.clone();
        let retirement_failed = |old_key_id: Option<KeyId>, source: RemoteError| RotationError::RetirementFailed {
            new_key_id: new_key_id.clone(),
            old_key_id,
            source,
        };

        let keys = bounded(deadline, "list_keys", self.keys.list_keys(&attempt.principal))
            .await
            .map_err(|source| retirement_failed(None, source))?;

        let others = keys.iter().filter(|k| k.id != new_key_id).count();
        if others > 1 && !matches!(self.config.retire, RetirePolicy::Explicit(_)) {
            warn!(
                candidates = others,
                policy = ?self.config.retire,
                "principal has several previous keys; retiring only one"
            );
        }

        let old = match self
            .config
            .retire
            .select(&keys, &new_key_id)
            .map_err(|source| retirement_failed(None, source))?
        {
            Some(old) => old.id.clone(),
            None => {
                info!("no previous access key to retire");
                return Ok(());
            }
        };

        bounded(
            deadline,
            "delete_key",
            self.keys.delete_key(&attempt.principal, &old),
        )
        .await
        .map_err(|source| retirement_failed(Some(old.clone()), source))?;

        info!(key_id = %old.masked(), "retired old access key");
        attempt.old_key_id = Some(old);
        Ok(())
    }

    /// Best-effort delete of the new key after a verify/persist failure
    async fn compensate(&self, attempt: &mut RotationAttempt, primary: RotationError) -> RotationError {
        let pair = created_key(attempt);
        let key_id = pair.id.clone();
        warn!(
            key_id = %key_id.masked(),
            phase = %attempt.phase,
            error = %primary,
            "rolling back newly created access key"
        );

        // Own clock: rollback still runs after the deadline has passed
        let grace = Instant::now() + self.config.rollback_grace;
        let result = bounded(
            grace,
            "delete_key",
            self.keys.delete_key(&attempt.principal, &key_id),
        )
        .await;

        match result {
            Ok(()) => {
                attempt.mark_rolled_back();
                info!(key_id = %key_id.masked(), "rollback complete");
                primary
            }
            Err(rollback) => {
                error!(
                    orphan_key_id = %key_id.masked(),
                    principal = %attempt.principal,
                    error = %rollback,
                    "rollback failed; two access keys are live and manual cleanup is required"
                );
                RotationError::RollbackFailed {
                    primary: Box::new(primary),
                    orphan_key_id: key_id,
                    rollback,
                }
            }
        }
    }

    fn report(&self, attempt: &RotationAttempt) -> RotationReport {
        let pair = created_key(attempt);
        RotationReport {
            attempt_id: attempt.attempt_id,
            principal: attempt.principal.clone(),
            secret_name: attempt.secret_name.clone(),
            new_key_id: pair.id.clone(),
            retired_key_id: attempt.old_key_id.clone(),
            phase: attempt.phase,
            started_at: attempt.started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Bound a remote call by the rotation deadline
async fn bounded<T, F>(deadline: Instant, operation: &'static str, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>>,
{
    match timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::cancelled(operation, "rotation deadline elapsed")),
    }
}

fn created_key(attempt: &RotationAttempt) -> &AccessKeyPair {
    match attempt.new_key.as_ref() {
        Some(pair) => pair,
        None => unreachable!("step scheduled before the new key was created"),
    }
}

fn verification_failed(pair: &AccessKeyPair, source: RemoteError) -> RotationError {
    RotationError::VerificationFailed {
        key_id: pair.id.clone(),
        source,
    }
}
