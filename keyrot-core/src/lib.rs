//! keyrot Core - Access-Key Rotation Workflow
//!
//! This crate provides the rotation workflow for IAM access keys: create a
//! new key, verify it, store it in a vault, then retire the old key, with a
//! compensating delete when a step fails before the new key is stored.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            KeyRotationCoordinator            │
//! │   Create → Verify → Persist → Retire         │
//! │        └── Rollback (verify/persist) ──┘     │
//! └──────────────────────────────────────────────┘
//!              │                      │
//!              ▼                      ▼
//!      IdentityKeyStore          SecretVault
//!   (keyrot-aws / memory)   (keyrot-aws / memory)
//! ```
//!
//! # Modules
//!
//! - [`coordinator`] - Rotation workflow driver
//! - [`phase`] - Phase enum and transition table
//! - [`store`] - Collaborator traits
//! - [`memory`] - In-memory collaborators
//! - [`config`] - Deadlines, verification retries, retirement policy
//! - [`sanitize`] - Input validation and output redaction
//! - [`error`] - Error types
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyrot_core::{KeyRotationCoordinator, MemoryKeyStore, MemoryVault, Principal, RotationConfig};
//!
//! async fn example() {
//!     let coordinator = KeyRotationCoordinator::new(
//!         Arc::new(MemoryKeyStore::default()),
//!         Arc::new(MemoryVault::new()),
//!         RotationConfig::default(),
//!     );
//!
//!     let report = coordinator
//!         .rotate(&Principal::new("alice"), "vault/alice-key")
//!         .await
//!         .unwrap();
//!     println!("new key: {}", report.new_key_id.masked());
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod phase;
pub mod sanitize;
pub mod store;
pub mod types;

// Re-export main types
pub use config::{RetirePolicy, RotationConfig, VerifyPolicy};
pub use coordinator::{KeyRotationCoordinator, RotationReport};
pub use error::{
    RemoteError, RemoteErrorKind, RemoteResult, RotationError, RotationResult, Severity,
};
pub use memory::{MemoryKeyStore, MemoryVault};
pub use phase::{transition, Action, Phase, RotationAttempt, Step, StepOutcome};
pub use sanitize::{redact, SanitizeError, SanitizeResult};
pub use store::{IdentityKeyStore, KeyAdministration, SecretVault};
pub use types::{
    AccessKeyPair, CallerIdentity, KeyId, KeyMetadata, KeyStatus, MfaDevice, Principal,
    SecretKey, SecretRecord, MFA_MAX_AGE_DAYS,
};

/// keyrot core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
