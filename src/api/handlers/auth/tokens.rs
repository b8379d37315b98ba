//! Signed access/refresh token pairs.
//!
//! Both tokens are self-contained HS256 JWTs carrying the owning user id and
//! an expiry; the refresh token simply gets a longer horizon. The `iss`
//! claim holds the issue instant as unix seconds, so two pairs minted for
//! the same user are still distinguishable.

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims embedded in every access and refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Claims {
    pub(super) user_id: i64,
    pub(super) exp: i64,
    pub(super) iss: String,
}

/// An access/refresh pair minted together.
#[derive(Debug, Clone)]
pub(super) struct TokenPair {
    pub(super) access: String,
    pub(super) refresh: String,
}

/// Issue a token pair for a user.
///
/// TTLs are minutes; the caller supplies them from `AuthConfig`.
pub(super) fn issue_pair(
    user_id: i64,
    secret: &str,
    access_ttl_minutes: i64,
    refresh_ttl_minutes: i64,
) -> Result<TokenPair> {
    let now = unix_now()?;
    let key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::new(Algorithm::HS256);

    let access = jsonwebtoken::encode(
        &header,
        &Claims {
            user_id,
            exp: now + access_ttl_minutes * 60,
            iss: now.to_string(),
        },
        &key,
    )
    .context("failed to sign access token")?;

    let refresh = jsonwebtoken::encode(
        &header,
        &Claims {
            user_id,
            exp: now + refresh_ttl_minutes * 60,
            iss: now.to_string(),
        },
        &key,
    )
    .context("failed to sign refresh token")?;

    Ok(TokenPair { access, refresh })
}

/// Check signature and expiry.
///
/// The algorithm is pinned to HS256: a token whose header names any other
/// algorithm is invalid, which closes the algorithm-substitution hole.
pub(super) fn verify(token: &str, secret: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .is_ok()
}

/// Decode claims from an already-trusted token.
///
/// Signature is still checked; expiry is not, so the user id can be read out
/// of a token that was accepted earlier in the request.
pub(super) fn extract_claims(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = false;

    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .context("failed to decode token claims")
}

fn unix_now() -> Result<i64> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs();
    i64::try_from(seconds).context("system clock out of range")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn pair_round_trips() {
        let pair = issue_pair(42, SECRET, 15, 43830).unwrap();
        assert!(verify(&pair.access, SECRET));
        assert!(verify(&pair.refresh, SECRET));

        let claims = extract_claims(&pair.access, SECRET).unwrap();
        assert_eq!(claims.user_id, 42);
    }

    #[test]
    fn wrong_secret_fails() {
        let pair = issue_pair(42, SECRET, 15, 43830).unwrap();
        assert!(!verify(&pair.access, "other-secret"));
        assert!(extract_claims(&pair.access, "other-secret").is_err());
    }

    #[test]
    fn expired_token_fails_verification() {
        // Negative TTL puts the expiry in the past.
        let pair = issue_pair(42, SECRET, -60, -60).unwrap();
        assert!(!verify(&pair.access, SECRET));
    }

    #[test]
    fn expired_token_still_yields_claims() {
        let pair = issue_pair(7, SECRET, -60, -60).unwrap();
        let claims = extract_claims(&pair.access, SECRET).unwrap();
        assert_eq!(claims.user_id, 7);
    }

    #[test]
    fn non_hmac_algorithm_is_rejected() {
        // An unsigned token ("alg": "none") must never validate.
        let header = r#"{"alg":"none","typ":"JWT"}"#;
        let body = r#"{"user_id":1,"exp":9999999999,"iss":"0"}"#;
        let engine = |value: &str| {
            use base64ct::{Base64UrlUnpadded, Encoding};
            Base64UrlUnpadded::encode_string(value.as_bytes())
        };
        let forged = format!("{}.{}.", engine(header), engine(body));
        assert!(!verify(&forged, SECRET));
    }

    #[test]
    fn iss_holds_issue_instant() {
        let pair = issue_pair(1, SECRET, 15, 30).unwrap();
        let claims = extract_claims(&pair.refresh, SECRET).unwrap();
        let issued: i64 = claims.iss.parse().unwrap();
        assert!(issued > 0);
        assert_eq!(claims.exp, issued + 30 * 60);
    }
}
