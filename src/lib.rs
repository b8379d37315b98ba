//! # Custodia (Authentication & Session Lifecycle)
//!
//! `custodia` is a REST backend for credential verification, paired
//! access/refresh token issuance, device-bound session tracking, and the
//! confirmation-code workflow behind account activation and password
//! recovery.
//!
//! ## Sessions
//!
//! A session binds a token pair to the client fingerprint that produced it
//! (device class, IP, user agent). Login keeps at most one live session per
//! fingerprint; refresh rotates the pair atomically and never leaves a
//! half-rotated session behind.
//!
//! ## Confirmation codes
//!
//! Activation and password recovery are gated by short-lived six-digit
//! codes, scoped to the flow that issued them (`registration` or `forgot`).
//! A user has at most one outstanding code at a time.
//!
//! ## Email
//!
//! Outbound mail goes through a transactional outbox: handlers enqueue rows
//! in the same database transaction as the mutation they notify about, and a
//! background worker delivers them with retry/backoff. A slow mail provider
//! never blocks an auth operation.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

}
