//! Rotation Configuration
//!
//! Deadlines, verification retries and the policy that picks which key to
//! retire. Supports loading from environment variables with the `KEYROT_`
//! prefix.

use serde::Serialize;
use std::env;
use std::time::Duration;

use crate::error::RemoteError;
use crate::types::{KeyId, KeyMetadata};

/// Default overall deadline in seconds
pub const DEFAULT_DEADLINE_SECS: u64 = 15;
/// Default rollback grace period in seconds
pub const DEFAULT_ROLLBACK_GRACE_SECS: u64 = 5;
/// Default verification attempts
pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 5;
/// Default pause between verification attempts in milliseconds
pub const DEFAULT_VERIFY_INTERVAL_MS: u64 = 2_000;

/// Verification retry policy
///
/// New keys are eventually consistent: the first few calls signed with a
/// fresh key may be rejected as unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifyPolicy {
    /// Total attempts (at least one is always made)
    pub attempts: u32,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_VERIFY_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_VERIFY_INTERVAL_MS),
        }
    }
}

impl VerifyPolicy {
    /// Single attempt, no waiting
    pub fn once() -> Self {
        Self {
            attempts: 1,
            interval: Duration::ZERO,
        }
    }
}

/// Which listed key counts as "the old key"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetirePolicy {
    /// First listed key that is not the new key
    FirstOther,
    /// Non-new key with the earliest creation time; undated keys count as newest
    Oldest,
    /// Exactly this key; fails if it is not listed
    Explicit(KeyId),
}

impl Default for RetirePolicy {
    fn default() -> Self {
        RetirePolicy::FirstOther
    }
}

impl RetirePolicy {
    /// Parse `first` / `oldest` (explicit ids come from their own flag)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first" | "first-other" => Some(Self::FirstOther),
            "oldest" => Some(Self::Oldest),
            _ => None,
        }
    }

    /// Pick the key to retire from a listing
    ///
    /// `Ok(None)` means the principal has no other key.
    pub fn select<'a>(
        &self,
        keys: &'a [KeyMetadata],
        new_key_id: &KeyId,
    ) -> Result<Option<&'a KeyMetadata>, RemoteError> {
        let mut candidates = keys.iter().filter(|k| &k.id != new_key_id);

        match self {
            RetirePolicy::FirstOther => Ok(candidates.next()),
            RetirePolicy::Oldest => {
                Ok(candidates.min_by_key(|k| (k.created_at.is_none(), k.created_at)))
            }
            RetirePolicy::Explicit(id) => candidates.find(|k| &k.id == id).map(Some).ok_or_else(|| {
                RemoteError::not_found(
                    "list_keys",
                    format!(
                        "access key {} is not among the principal's previous keys",
                        id.masked()
                    ),
                )
            }),
        }
    }
}

/// Rotation configuration
#[derive(Debug, Clone, Serialize)]
pub struct RotationConfig {
    /// Budget for all remote calls of one rotation
    pub deadline: Duration,
    /// Extra time granted to the compensating delete
    pub rollback_grace: Duration,
    /// Verification retries
    pub verify: VerifyPolicy,
    /// Old-key selection
    pub retire: RetirePolicy,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            rollback_grace: Duration::from_secs(DEFAULT_ROLLBACK_GRACE_SECS),
            verify: VerifyPolicy::default(),
            retire: RetirePolicy::default(),
        }
    }
}

impl RotationConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - KEYROT_TIMEOUT_SECS: overall deadline in seconds
    /// - KEYROT_ROLLBACK_GRACE_SECS: rollback grace period in seconds
    /// - KEYROT_VERIFY_ATTEMPTS: verification attempts
    /// - KEYROT_VERIFY_INTERVAL_MS: pause between verification attempts
    /// - KEYROT_RETIRE_POLICY: `first` or `oldest`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            deadline: env_parse("KEYROT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.deadline),
            rollback_grace: env_parse("KEYROT_ROLLBACK_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rollback_grace),
            verify: VerifyPolicy {
                attempts: env_parse("KEYROT_VERIFY_ATTEMPTS").unwrap_or(defaults.verify.attempts),
                interval: env_parse("KEYROT_VERIFY_INTERVAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.verify.interval),
            },
            retire: env::var("KEYROT_RETIRE_POLICY")
                .ok()
                .and_then(|s| RetirePolicy::from_str(&s))
                .unwrap_or(defaults.retire),
        }
    }

    /// Set the overall deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the rollback grace period
    pub fn with_rollback_grace(mut self, grace: Duration) -> Self {
        self.rollback_grace = grace;
        self
    }

    /// Set the verification policy
    pub fn with_verify(mut self, verify: VerifyPolicy) -> Self {
        self.verify = verify;
        self
    }

    /// Set the retirement policy
    pub fn with_retire(mut self, retire: RetirePolicy) -> Self {
        self.retire = retire;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
