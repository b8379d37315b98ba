//! Password hashing with Argon2id.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};

/// Hash a plaintext password with a fresh random salt.
///
/// Uses the Argon2id defaults; fails only if the hasher itself errors.
pub(super) fn hash(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a plaintext password against a stored hash.
///
/// Returns `false` on mismatch or a malformed stored hash, never an error:
/// callers treat both the same way.
pub(super) fn verify(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = argon2::PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hash = hash("Secret1!").unwrap();
        assert!(verify("Secret1!", &hash));
    }

    #[test]
    fn wrong_password_fails() {
        let hash = hash("Secret1!").unwrap();
        assert!(!verify("Secret2!", &hash));
    }

    #[test]
    fn different_passwords_different_hashes() {
        let first = hash("p1").unwrap();
        let second = hash("p2").unwrap();
        assert_ne!(first, second);
        assert!(!verify("p1", &second));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify("Secret1!", "not-a-phc-hash"));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash("same").unwrap();
        let second = hash("same").unwrap();
        assert_ne!(first, second);
    }
}
