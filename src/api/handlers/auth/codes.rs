//! Confirmation-code engine for activation and password recovery.
//!
//! Codes are six decimal digits, single-use, and scoped to the flow that
//! issued them. The stored code, its action scope, and its issue timestamp
//! move together: issuing overwrites all three, consuming clears all three.
//! Expiry is measured against a caller-supplied TTL with an inclusive
//! boundary (`age == ttl` is already expired).

use anyhow::{Context, Result};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

pub(crate) const CONFIRM_CODE_LENGTH: usize = 6;

/// Flow that an outstanding confirmation code belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConfirmAction {
    Registration,
    Forgot,
}

impl ConfirmAction {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Forgot => "forgot",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "registration" => Some(Self::Registration),
            "forgot" => Some(Self::Forgot),
            _ => None,
        }
    }
}

/// Lifecycle marker for the confirmation flow, independent of `activation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConfirmStatus {
    Quest,
    Waiting,
    Error,
    Success,
    Unknown,
}

impl ConfirmStatus {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Quest => "quest",
            Self::Waiting => "waiting",
            Self::Error => "error",
            Self::Success => "success",
            Self::Unknown => "unknown",
        }
    }

    /// NULL and unrecognized values both map to `Unknown`.
    pub(crate) fn parse(value: Option<&str>) -> Self {
        match value {
            Some("quest") => Self::Quest,
            Some("waiting") => Self::Waiting,
            Some("error") => Self::Error,
            Some("success") => Self::Success,
            _ => Self::Unknown,
        }
    }
}

/// Generate a six-digit confirmation code.
///
/// Codes are short-lived, single-use, and checked server-side, so a
/// non-cryptographic RNG is acceptable here.
pub(crate) fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CONFIRM_CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..=9)))
        .collect()
}

/// Generate the per-user secret behind activation keys.
pub(super) fn generate_token_secret() -> Result<String> {
    use base64ct::{Base64UrlUnpadded, Encoding};

    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token secret")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Snapshot of a user's outstanding confirmation state.
///
/// `age_seconds` is computed by the store at read time, so the check itself
/// stays a pure function of its inputs.
#[derive(Debug, Clone)]
pub(crate) struct StoredConfirm {
    pub(crate) action: ConfirmAction,
    pub(crate) code: String,
    pub(crate) age_seconds: i64,
}

/// Outcome of validating a submitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckOutcome {
    Ok,
    ActionMismatch,
    CodeMismatch,
    Expired,
}

/// Validate a submitted code against the stored snapshot.
///
/// Order is fixed: action scope first, then the code itself, then expiry,
/// so callers can tell "wrong flow" from "wrong or late code".
pub(crate) fn check(
    stored: &StoredConfirm,
    submitted_code: &str,
    expected_action: ConfirmAction,
    ttl_seconds: i64,
) -> CheckOutcome {
    if stored.action != expected_action {
        return CheckOutcome::ActionMismatch;
    }

    if stored.code != submitted_code {
        return CheckOutcome::CodeMismatch;
    }

    if stored.age_seconds >= ttl_seconds {
        return CheckOutcome::Expired;
    }

    CheckOutcome::Ok
}

/// Derive the out-of-band activation key for a user.
///
/// Hex SHA-256 over `secret::email`, kept stable so previously issued
/// activation links remain valid.
pub(crate) fn activation_key(secret: &str, email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"::");
    hasher.update(email.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(age: i64) -> StoredConfirm {
        StoredConfirm {
            action: ConfirmAction::Registration,
            code: "042153".to_string(),
            age_seconds: age,
        }
    }

    #[test]
    fn code_is_six_digits() {
        for _ in 0..32 {
            let code = generate_code();
            assert_eq!(code.len(), CONFIRM_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn token_secret_is_url_safe() {
        let secret = generate_token_secret().unwrap();
        assert_eq!(secret.len(), 43);
        assert!(
            secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn check_passes_within_ttl() {
        assert_eq!(
            check(&stored(0), "042153", ConfirmAction::Registration, 300),
            CheckOutcome::Ok
        );
    }

    #[test]
    fn ttl_boundary_is_inclusive() {
        // Accepted one second before the limit, rejected exactly at it.
        assert_eq!(
            check(&stored(299), "042153", ConfirmAction::Registration, 300),
            CheckOutcome::Ok
        );
        assert_eq!(
            check(&stored(300), "042153", ConfirmAction::Registration, 300),
            CheckOutcome::Expired
        );
    }

    #[test]
    fn action_is_checked_before_code() {
        // Wrong flow and wrong code: the action mismatch wins.
        assert_eq!(
            check(&stored(0), "999999", ConfirmAction::Forgot, 300),
            CheckOutcome::ActionMismatch
        );
    }

    #[test]
    fn code_is_checked_before_expiry() {
        // Wrong code on an expired entry still reports the mismatch.
        assert_eq!(
            check(&stored(10_000), "999999", ConfirmAction::Registration, 300),
            CheckOutcome::CodeMismatch
        );
    }

    #[test]
    fn leading_zeros_are_significant() {
        assert_eq!(
            check(&stored(0), "42153", ConfirmAction::Registration, 300),
            CheckOutcome::CodeMismatch
        );
    }

    #[test]
    fn activation_key_is_deterministic() {
        let first = activation_key("secret", "alice@example.com");
        let second = activation_key("secret", "alice@example.com");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn activation_key_binds_secret_and_email() {
        let key = activation_key("secret", "alice@example.com");
        assert_ne!(key, activation_key("other", "alice@example.com"));
        assert_ne!(key, activation_key("secret", "bob@example.com"));
    }

    #[test]
    fn confirm_action_round_trips() {
        assert_eq!(
            ConfirmAction::parse("registration"),
            Some(ConfirmAction::Registration)
        );
        assert_eq!(ConfirmAction::parse("forgot"), Some(ConfirmAction::Forgot));
        assert_eq!(ConfirmAction::parse("other"), None);
    }

    #[test]
    fn confirm_status_parses_unknown() {
        assert_eq!(ConfirmStatus::parse(Some("waiting")), ConfirmStatus::Waiting);
        assert_eq!(ConfirmStatus::parse(Some("bogus")), ConfirmStatus::Unknown);
        assert_eq!(ConfirmStatus::parse(None), ConfirmStatus::Unknown);
    }
}
