//! keyrot CLI Entry Point
//!
//! Main entry point for the keyrot command-line interface.
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   keyrot status         - Show the identity of the current session
//!   keyrot keys list      - List access keys
//!   keyrot keys disable   - Deactivate an access key
//!   keyrot keys rotate    - Replace an access key
//!   keyrot mfa status     - Show MFA devices and their age

use clap::Parser;
use keyrot_cli::{handler, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging if verbose
    if cli.verbose {
        init_logging();
    }

    // Run the CLI
    if let Err(e) = handler::run(cli).await {
        let label = if e.is_warning() { "Warning" } else { "Error" };
        eprintln!("{}: {}", label, e.redacted());
        std::process::exit(e.exit_code());
    }
}

/// Initialize logging with tracing
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyrot_cli=debug,keyrot_core=debug,keyrot_aws=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
