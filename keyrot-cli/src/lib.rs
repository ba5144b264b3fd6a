//! keyrot CLI - Command Line Interface
//!
//! This crate provides a command-line interface for managing IAM access
//! keys, with a safe rotation workflow at its core.
//!
//! # Features
//!
//! - Show the identity of the current session
//! - List and disable access keys
//! - Rotate an access key and store the new one in Secrets Manager
//! - Inspect MFA devices and flag those due for replacement
//!
//! # Usage
//!
//! ```text
//! keyrot [OPTIONS] <COMMAND>
//!
//! Commands:
//!   status    Show the identity of the current session
//!   keys      Manage access keys
//!   mfa       Inspect MFA devices
//!
//! Options:
//!   -p, --profile <PROFILE>  AWS shared-config profile
//!       --region <REGION>    AWS region override
//!       --backend <BACKEND>  Where keys and secrets live (aws, memory) [default: aws]
//!   -f, --format <FORMAT>    Output format (json, table, plain) [default: table]
//!   -v, --verbose            Enable verbose output
//!       --timeout <TIMEOUT>  Deadline for remote calls in seconds [default: 15]
//!   -h, --help               Print help
//!   -V, --version            Print version
//! ```
//!
//! # Examples
//!
//! ## Rotate the current user's key
//! ```text
//! keyrot keys rotate --secret-name ci/deploy-key
//! ```
//!
//! ## Rotate another user's key, retiring the oldest one
//! ```text
//! keyrot -p ops keys rotate --user alice --retire oldest
//! ```
//!
//! ## Dry run without AWS
//! ```text
//! keyrot --backend memory keys rotate --user alice
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Backend, Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// keyrot CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
