//! MFA Commands
//!
//! Read-only view of the MFA devices registered to a user.

use clap::Subcommand;

/// MFA subcommands
#[derive(Subcommand, Debug)]
pub enum MfaCommands {
    /// Show MFA devices and flag those due for replacement
    Status {
        /// IAM user name (defaults to the current user)
        #[arg(short, long)]
        user: Option<String>,
    },
}
