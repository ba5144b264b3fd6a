//! Input Validation and Output Redaction
//!
//! Everything an operator types is validated here before any remote call,
//! and every error message that leaves the process goes through [`redact`].
//!
//! # Redaction rules
//!
//! 1. **Allowlist**: ARNs and already-masked key ids pass through untouched.
//! 2. **Key ids**: anything shaped like an access key id (`AKIA…`/`ASIA…`)
//!    keeps its first and last four characters, the rest is masked.
//! 3. **Secrets**: any run of 40 or more base64-alphabet characters (the
//!    shape of a secret access key or session token) becomes `[REDACTED]`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Sanitization error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    /// Invalid principal name
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    /// Invalid secret name
    #[error("Invalid secret name: {0}")]
    InvalidSecretName(String),

    /// Invalid access key id
    #[error("Invalid access key id: {0}")]
    InvalidKeyId(String),

    /// Input too long
    #[error("Input exceeds maximum length ({max}): got {actual}")]
    InputTooLong { max: usize, actual: usize },

    /// Empty input when not allowed
    #[error("Input cannot be empty: {0}")]
    EmptyInput(String),
}

pub type SanitizeResult<T> = Result<T, SanitizeError>;

// =============================================================================
// Regex Patterns (compiled once)
// =============================================================================

/// IAM user names: alphanumerics plus `+=,.@_-`
static PRINCIPAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+=,.@_\-]{1,64}$").expect("Invalid principal regex")
});

/// Secrets Manager names: alphanumerics plus `/_+=.@-`
static SECRET_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9/_+=.@\-]{1,512}$").expect("Invalid secret name regex")
});

/// Access key ids: upper-case alphanumerics
static KEY_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]{16,128}$").expect("Invalid key id regex")
});

/// Shapes that are never redacted
static ALLOWLIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"arn:aws[a-z\-]*:[a-z0-9\-]*:[a-z0-9\-]*:[0-9]{0,12}:[^\s"',;]+|\b(?:AKIA|ASIA)\*+[A-Z0-9]{4}\b"#)
        .expect("Invalid allowlist regex")
});

/// Long-term and temporary access key ids
static ACCESS_KEY_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:AKIA|ASIA)[A-Z0-9]{16}\b").expect("Invalid access key regex")
});

/// Secret-shaped tokens
static SECRET_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9/+=]{40,}").expect("Invalid secret token regex")
});

// =============================================================================
// Input Validators
// =============================================================================

/// Validate an IAM user name
pub fn validate_principal(name: &str) -> SanitizeResult<&str> {
    if name.is_empty() {
        return Err(SanitizeError::EmptyInput("principal".to_string()));
    }

    if name.len() > 64 {
        return Err(SanitizeError::InputTooLong {
            max: 64,
            actual: name.len(),
        });
    }

    if !PRINCIPAL_PATTERN.is_match(name) {
        return Err(SanitizeError::InvalidPrincipal(format!(
            "'{}' contains invalid characters",
            name
        )));
    }

    Ok(name)
}

/// Validate a vault secret name
pub fn validate_secret_name(name: &str) -> SanitizeResult<&str> {
    if name.is_empty() {
        return Err(SanitizeError::EmptyInput("secret name".to_string()));
    }

    if name.len() > 512 {
        return Err(SanitizeError::InputTooLong {
            max: 512,
            actual: name.len(),
        });
    }

    if !SECRET_NAME_PATTERN.is_match(name) {
        return Err(SanitizeError::InvalidSecretName(format!(
            "'{}' contains invalid characters",
            name
        )));
    }

    Ok(name)
}

/// Validate an access key id
pub fn validate_key_id(id: &str) -> SanitizeResult<&str> {
    if id.is_empty() {
        return Err(SanitizeError::EmptyInput("key id".to_string()));
    }

    if !KEY_ID_PATTERN.is_match(id) {
        // Never echo the rejected value; it may be a pasted secret
        return Err(SanitizeError::InvalidKeyId(format!(
            "expected 16-128 upper-case alphanumerics, got {} characters",
            id.len()
        )));
    }

    Ok(id)
}

// =============================================================================
// Redaction
// =============================================================================

/// Mask all but the first and last four characters of a key id
pub fn mask_key_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

/// Redact credentials from a message destined for the operator or logs
pub fn redact(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut cursor = 0;

    for allowed in ALLOWLIST.find_iter(message) {
        out.push_str(&redact_fragment(&message[cursor..allowed.start()]));
        out.push_str(allowed.as_str());
        cursor = allowed.end();
    }
    out.push_str(&redact_fragment(&message[cursor..]));

    out
}

fn redact_fragment(fragment: &str) -> String {
    let masked = ACCESS_KEY_ID.replace_all(fragment, |caps: &Captures| mask_key_id(&caps[0]));
    SECRET_TOKEN.replace_all(&masked, "[REDACTED]").into_owned()
}

// =============================================================================
// Tests
// =============================================================================
