//! Rotation State Machine
//!
//! A rotation is driven by an explicit phase plus a transition table.
//! `Phase` records the last step that completed; [`transition`] maps the
//! phase and the outcome of the step attempted from it to what happens next.
//!
//! ```text
//! Pending ──create──▶ Created ──verify──▶ Verified ──persist──▶ Persisted ──retire──▶ OldRetired
//!    │ fail              │ fail              │ fail                 │ fail
//!    ▼                   ▼                   ▼                      ▼
//!  Abort             Compensate ─────────────┘                    Abort (warning)
//!                        │
//!                        ▼
//!                    RolledBack
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::types::{AccessKeyPair, KeyId, Principal};

/// Last completed step of a rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing has happened yet
    Pending,
    /// New key exists
    Created,
    /// New key confirmed usable
    Verified,
    /// New key material stored in the vault
    Persisted,
    /// Old key deleted (or there was none)
    OldRetired,
    /// New key deleted after a failure
    RolledBack,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Created => "created",
            Phase::Verified => "verified",
            Phase::Persisted => "persisted",
            Phase::OldRetired => "old_retired",
            Phase::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forward step of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Verify,
    Persist,
    Retire,
}

impl Step {
    /// Phase reached when this step succeeds
    pub fn completes(&self) -> Phase {
        match self {
            Step::Create => Phase::Created,
            Step::Verify => Phase::Verified,
            Step::Persist => Phase::Persisted,
            Step::Retire => Phase::OldRetired,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Verify => "verify",
            Step::Persist => "persist",
            Step::Retire => "retire",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the step attempted from the current phase
///
/// Entering `Pending` counts as `Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
}

/// What the coordinator does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run the next forward step
    Run(Step),
    /// Delete the new key, then report the failure
    Compensate,
    /// Rotation finished successfully
    Complete,
    /// Report the failure without compensation
    Abort,
}

/// Transition table
///
/// Compensation is only reachable while the new key exists but is not yet
/// durably stored. Once persisted, the new key is never deleted.
pub fn transition(phase: Phase, outcome: StepOutcome) -> Action {
    use StepOutcome::{Failed, Succeeded};

    match (phase, outcome) {
        (Phase::Pending, Succeeded) => Action::Run(Step::Create),
        (Phase::Pending, Failed) => Action::Abort,

        (Phase::Created, Succeeded) => Action::Run(Step::Verify),
        (Phase::Created, Failed) => Action::Compensate,

        (Phase::Verified, Succeeded) => Action::Run(Step::Persist),
        (Phase::Verified, Failed) => Action::Compensate,

        (Phase::Persisted, Succeeded) => Action::Run(Step::Retire),
        (Phase::Persisted, Failed) => Action::Abort,

        (Phase::OldRetired, Succeeded) => Action::Complete,
        (Phase::OldRetired, Failed) => Action::Abort,

        (Phase::RolledBack, _) => Action::Abort,
    }
}

/// State of one in-flight rotation
///
/// Ephemeral; owned by a single `rotate` call and never persisted.
#[derive(Debug)]
pub struct RotationAttempt {
    pub attempt_id: Uuid,
    pub principal: Principal,
    pub secret_name: String,
    pub new_key: Option<AccessKeyPair>,
    pub old_key_id: Option<KeyId>,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    /// Phases passed through, in order
    pub history: Vec<Phase>,
}

impl RotationAttempt {
    pub fn new(principal: Principal, secret_name: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            principal,
            secret_name: secret_name.into(),
            new_key: None,
            old_key_id: None,
            phase: Phase::Pending,
            started_at: Utc::now(),
            history: vec![Phase::Pending],
        }
    }

    /// Record a successful step
    pub fn advance(&mut self, step: Step) {
        self.enter(step.completes());
    }

    /// Record a successful compensation
    pub fn mark_rolled_back(&mut self) {
        self.enter(Phase::RolledBack);
    }

    /// Next action given the outcome of the step just attempted
    pub fn next_action(&self, outcome: StepOutcome) -> Action {
        transition(self.phase, outcome)
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.history.push(phase);
    }
}
