//! Key Commands
//!
//! Commands for listing, disabling and rotating access keys.

use clap::{Args, Subcommand, ValueEnum};

/// Secret that receives rotated key material when none is given
pub const DEFAULT_SECRET_NAME: &str = "keyrot/access-key";

/// Key subcommands
#[derive(Subcommand, Debug)]
pub enum KeysCommands {
    /// List access keys
    List {
        /// IAM user name (defaults to the current user)
        #[arg(short, long)]
        user: Option<String>,

        /// Print full key ids instead of masked ones
        #[arg(long)]
        show_ids: bool,
    },

    /// Deactivate an access key without deleting it
    Disable {
        /// Access key id
        #[arg(short, long)]
        key_id: String,

        /// IAM user name (defaults to the current user)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Replace the current access key with a new one
    Rotate(RotateArgs),
}

/// Arguments for `keys rotate`
#[derive(Args, Debug)]
pub struct RotateArgs {
    /// IAM user name (defaults to the current user)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Secret that receives the new key (env: KEYROT_SECRET_NAME)
    #[arg(short, long, env = "KEYROT_SECRET_NAME", default_value = DEFAULT_SECRET_NAME)]
    pub secret_name: String,

    /// Retire exactly this key
    #[arg(long, conflicts_with = "retire")]
    pub old_key_id: Option<String>,

    /// Which previous key to retire (env: KEYROT_RETIRE_POLICY)
    #[arg(long)]
    pub retire: Option<RetireArg>,

    /// Verification attempts before giving up (env: KEYROT_VERIFY_ATTEMPTS)
    #[arg(long)]
    pub verify_attempts: Option<u32>,

    /// Pause between verification attempts (env: KEYROT_VERIFY_INTERVAL_MS)
    #[arg(long)]
    pub verify_interval_ms: Option<u64>,
}

/// Old-key selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetireArg {
    /// First listed key other than the new one
    First,
    /// Key with the earliest creation date
    Oldest,
}
