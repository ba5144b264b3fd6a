//! Output Formatting
//!
//! Utilities for formatting CLI output in various formats.

use chrono::{DateTime, Utc};
use keyrot_core::{
    CallerIdentity, KeyId, KeyMetadata, MfaDevice, Principal, RemoteErrorKind, RotationError,
    RotationReport,
};
use serde::Serialize;

use crate::commands::OutputFormat;
use crate::error::CliResult;

/// Caller identity as printed by `status`
#[derive(Debug, Serialize)]
struct StatusView<'a> {
    user: &'a str,
    arn: &'a str,
    account_id: &'a str,
    user_id: &'a str,
    mfa: &'static str,
}

/// One row of `keys list`
#[derive(Debug, Serialize)]
pub struct KeyRow {
    pub key_id: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl KeyRow {
    pub fn from_metadata(key: &KeyMetadata, show_ids: bool) -> Self {
        Self {
            key_id: display_id(&key.id, show_ids),
            status: key.status.to_string(),
            created_at: key.created_at,
        }
    }
}

/// One row of `mfa status`
#[derive(Debug, Serialize)]
pub struct MfaRow {
    pub serial_number: String,
    pub enabled_at: DateTime<Utc>,
    pub age_days: i64,
    pub needs_rotation: bool,
}

impl MfaRow {
    pub fn from_device(device: &MfaDevice, now: DateTime<Utc>) -> Self {
        Self {
            serial_number: device.serial_number.clone(),
            enabled_at: device.enabled_at,
            age_days: device.age_days(now),
            needs_rotation: device.needs_rotation(now),
        }
    }
}

#[derive(Debug, Serialize)]
struct MfaView<'a> {
    user: &'a str,
    enabled: bool,
    devices: &'a [MfaRow],
}

/// Rotation that completed everything but retiring the old key
#[derive(Debug, Serialize)]
struct PartialRotationView<'a> {
    principal: &'a Principal,
    secret_name: &'a str,
    new_key_id: String,
    old_key_id: Option<String>,
    old_key_retired: bool,
}

/// Print as JSON
fn print_json<T: Serialize>(data: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}

/// Print the current session identity
pub fn print_identity(
    identity: &CallerIdentity,
    mfa_enabled: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let view = StatusView {
        user: identity.principal.as_str(),
        arn: &identity.arn,
        account_id: identity.account_id(),
        user_id: &identity.user_id,
        mfa: if mfa_enabled { "enabled" } else { "disabled" },
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            println!("Caller Identity");
            println!("===============");
            print_row("User:", view.user);
            print_row("ARN:", view.arn);
            print_row("Account:", view.account_id);
            print_row("User ID:", view.user_id);
            print_row("MFA:", view.mfa);
        }
        OutputFormat::Plain => {
            println!("{} {} {} mfa={}", view.user, view.account_id, view.arn, view.mfa);
        }
    }
    Ok(())
}

/// Print access keys of a principal
pub fn print_keys(
    principal: &Principal,
    keys: &[KeyMetadata],
    show_ids: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let rows: Vec<KeyRow> = keys
        .iter()
        .map(|k| KeyRow::from_metadata(k, show_ids))
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            println!("Access Keys for {}", principal);
            println!("{}", "=".repeat(16 + principal.as_str().len()));
            if rows.is_empty() {
                println!("(none)");
                return Ok(());
            }
            println!("{:<24} {:<10} {}", "KEY ID", "STATUS", "CREATED");
            print_separator();
            for row in &rows {
                println!(
                    "{:<24} {:<10} {}",
                    row.key_id,
                    row.status,
                    format_time(row.created_at)
                );
            }
        }
        OutputFormat::Plain => {
            for row in &rows {
                println!("{} {}", row.key_id, row.status);
            }
        }
    }
    Ok(())
}

/// Print the MFA devices of a principal
pub fn print_mfa_status(principal: &Principal, rows: &[MfaRow], format: OutputFormat) -> CliResult<()> {
    let view = MfaView {
        user: principal.as_str(),
        enabled: !rows.is_empty(),
        devices: rows,
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            println!("MFA for {}", principal);
            println!("{}", "=".repeat(8 + principal.as_str().len()));
            print_row("Status:", if view.enabled { "enabled" } else { "disabled" });
            for row in rows {
                print_separator();
                print_row("Device:", &row.serial_number);
                print_row("Enrolled:", &format_time(Some(row.enabled_at)));
                print_row("Age:", &format!("{} days", row.age_days));
                if row.needs_rotation {
                    print_row("Action:", "replace this device");
                }
            }
        }
        OutputFormat::Plain => {
            if rows.is_empty() {
                println!("disabled");
            }
            for row in rows {
                println!("{} {}", row.serial_number, row.age_days);
            }
        }
    }
    Ok(())
}

/// Print the outcome of `keys disable`
pub fn print_key_disabled(principal: &Principal, key_id: &KeyId, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "principal": principal,
            "key_id": key_id.masked(),
            "status": "inactive",
        }))?,
        OutputFormat::Table | OutputFormat::Plain => {
            print_success(&format!(
                "Access key {} of {} is now inactive",
                key_id.masked(),
                principal
            ));
        }
    }
    Ok(())
}

/// Print a successful rotation
pub fn print_rotation(report: &RotationReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("Key Rotation");
            println!("============");
            print_row("Attempt:", &report.attempt_id.to_string());
            print_row("User:", report.principal.as_str());
            print_row("New key:", &report.new_key_id.masked());
            print_row(
                "Retired key:",
                &report
                    .retired_key_id
                    .as_ref()
                    .map(KeyId::masked)
                    .unwrap_or_else(|| "(none)".to_string()),
            );
            print_row("Stored in:", &report.secret_name);
            print_row("Completed:", &format_time(Some(report.completed_at)));
        }
        OutputFormat::Plain => {
            println!("{} {}", report.new_key_id.masked(), report.secret_name);
        }
    }
    Ok(())
}

/// Report what state a failed rotation left behind
///
/// A rotation whose only failure was retiring the old key still produced a
/// working, stored key; that result goes to stdout in the chosen format.
/// Everything else is explained on stderr.
pub fn print_rotation_failure(
    principal: &Principal,
    secret_name: &str,
    err: &RotationError,
    format: OutputFormat,
) -> CliResult<()> {
    if let RotationError::RetirementFailed {
        new_key_id,
        old_key_id,
        ..
    } = err
    {
        let view = PartialRotationView {
            principal,
            secret_name,
            new_key_id: new_key_id.masked(),
            old_key_id: old_key_id.as_ref().map(KeyId::masked),
            old_key_retired: false,
        };

        match format {
            OutputFormat::Json => print_json(&view)?,
            OutputFormat::Table => {
                println!("Key Rotation (incomplete)");
                println!("=========================");
                print_row("User:", principal.as_str());
                print_row("New key:", &view.new_key_id);
                print_row(
                    "Not retired:",
                    view.old_key_id.as_deref().unwrap_or("(unknown)"),
                );
                print_row("Stored in:", secret_name);
            }
            OutputFormat::Plain => {
                println!("{} {}", view.new_key_id, secret_name);
            }
        }
        return Ok(());
    }

    eprintln!("{}", failure_notice(principal, err));
    Ok(())
}

/// State left behind by a rotation that did not produce a usable key
fn failure_notice(principal: &Principal, err: &RotationError) -> String {
    match err {
        RotationError::RollbackFailed { orphan_key_id, .. } => format!(
            "CRITICAL: rollback failed; two access keys are live for {}.\n          \
             Delete access key {} manually once the cause is fixed.",
            principal,
            orphan_key_id.masked()
        ),
        RotationError::CreationFailed { source, .. } if source.kind == RemoteErrorKind::Cancelled => {
            format!(
                "The deadline cut off key creation; a new access key may still have been issued \
                 for {}. Check with `keyrot keys list --user {}`.",
                principal, principal
            )
        }
        _ => format!("No access keys were changed for {}.", principal),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("Warning: {}", message);
}

/// Print a table row
pub fn print_row(key: &str, value: &str) {
    println!("{:<20} {}", key, value);
}

/// Print a separator line
pub fn print_separator() {
    println!("{}", "-".repeat(48));
}

fn display_id(id: &KeyId, show_ids: bool) -> String {
    if show_ids {
        id.to_string()
    } else {
        id.masked()
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
