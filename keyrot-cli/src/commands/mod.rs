//! CLI Commands Module
//!
//! Command definitions for the keyrot CLI.

pub mod keys;
pub mod mfa;

use clap::{Parser, Subcommand};
use keyrot_core::config::DEFAULT_DEADLINE_SECS;

/// IAM access-key rotation CLI
#[derive(Parser, Debug)]
#[command(name = "keyrot")]
#[command(author = "Rainbow City Foundation")]
#[command(version)]
#[command(about = "Rotate and manage IAM access keys")]
#[command(long_about = "A command-line tool for managing IAM access keys.\n\n\
    Rotation creates a new key, verifies it, stores it in Secrets Manager and \
    only then deletes the old key. A failure before the new key is stored \
    deletes the new key again.")]
pub struct Cli {
    /// AWS shared-config profile (env: KEYROT_PROFILE)
    #[arg(short, long, env = "KEYROT_PROFILE")]
    pub profile: Option<String>,

    /// AWS region override (env: KEYROT_REGION)
    #[arg(long, env = "KEYROT_REGION")]
    pub region: Option<String>,

    /// Where keys and secrets live
    #[arg(long, default_value = "aws")]
    pub backend: Backend,

    /// Output format (json, table, plain)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Deadline for all remote calls of one command, in seconds (env: KEYROT_TIMEOUT_SECS)
    #[arg(long, env = "KEYROT_TIMEOUT_SECS", default_value_t = DEFAULT_DEADLINE_SECS)]
    pub timeout: u64,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    Table,
    /// Plain text
    Plain,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Table
    }
}

/// Collaborator backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// IAM, STS and Secrets Manager
    Aws,
    /// In-process stores; nothing leaves the process (dry run)
    Memory,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the identity of the current session
    Status,

    /// Manage access keys
    #[command(subcommand)]
    Keys(keys::KeysCommands),

    /// Inspect MFA devices
    #[command(subcommand)]
    Mfa(mfa::MfaCommands),
}
