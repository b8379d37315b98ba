//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    pub surname: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ActivationRequest {
    pub email: String,
    pub key: String,
    /// Kept as a string so leading zeros survive.
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RecoveryRequest {
    pub email: String,
    pub code: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfirmCheckRequest {
    pub email: String,
    pub action: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendRequest {
    pub email: String,
}

/// Token pair returned by login and refresh.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// One active session, as shown in the session listing.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionInfo {
    pub id: i64,
    pub ip: String,
    pub device: String,
    pub os: String,
    pub browser: String,
    pub created_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionListResponse {
    pub count: i64,
    pub sessions: Vec<SessionInfo>,
}

/// Stable business-outcome codes carried in the response envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    AccountNotActivated = 1,
    PasswordMismatch = 2,
    AccountExists = 3,
    AccountNotCreated = 4,
    AlreadyActivated = 5,
    CodeExpired = 6,
    InvalidCode = 7,
    InvalidCredentials = 8,
    TokenExpired = 9,
    SessionNotFound = 10,
    ActionMismatch = 11,
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::AccountNotActivated => "account is not activated",
            Self::PasswordMismatch => "passwords do not match",
            Self::AccountExists => "account already exists",
            Self::AccountNotCreated => "account could not be created",
            Self::AlreadyActivated => "account is already activated",
            Self::CodeExpired => "confirmation code expired",
            Self::InvalidCode => "invalid confirmation code",
            Self::InvalidCredentials => "invalid credentials",
            Self::TokenExpired => "token expired",
            Self::SessionNotFound => "session not found",
            Self::ActionMismatch => "confirmation code belongs to another flow",
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Warning,
}

/// Uniform envelope for every auth endpoint.
///
/// Clients branch on `status` and `code`; `result` carries the payload when
/// there is one.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiResponse {
    pub code: u16,
    pub status: ResponseStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ApiResponse {
    #[must_use]
    pub fn success(message: &str) -> Self {
        Self {
            code: ErrorCode::Ok.code(),
            status: ResponseStatus::Success,
            message: message.to_string(),
            result: None,
        }
    }

    #[must_use]
    pub fn success_with(message: &str, result: serde_json::Value) -> Self {
        Self {
            code: ErrorCode::Ok.code(),
            status: ResponseStatus::Success,
            message: message.to_string(),
            result: Some(result),
        }
    }

    #[must_use]
    pub fn error(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            status: ResponseStatus::Error,
            message: code.message().to_string(),
            result: None,
        }
    }

    /// Envelope for infrastructure failures, no internal detail leaked.
    #[must_use]
    pub fn internal_error() -> Self {
        Self {
            code: 500,
            status: ResponseStatus::Error,
            message: "internal server error".to_string(),
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn registration_request_round_trips() -> Result<()> {
        let request = RegistrationRequest {
            email: "alice@example.com".to_string(),
            password: "Secret1!".to_string(),
            confirm_password: "Secret1!".to_string(),
            name: "Alice".to_string(),
            surname: "Doe".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegistrationRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.surname, "Doe");
        Ok(())
    }

    #[test]
    fn activation_code_keeps_leading_zeros() -> Result<()> {
        let decoded: ActivationRequest =
            serde_json::from_str(r#"{"email":"a@b.c","key":"k","code":"012345"}"#)?;
        assert_eq!(decoded.code, "012345");
        Ok(())
    }

    #[test]
    fn success_envelope_omits_empty_result() -> Result<()> {
        let value = serde_json::to_value(ApiResponse::success("logged out"))?;
        assert_eq!(value.get("code").and_then(serde_json::Value::as_u64), Some(0));
        assert_eq!(
            value.get("status").and_then(serde_json::Value::as_str),
            Some("success")
        );
        assert!(value.get("result").is_none());
        Ok(())
    }

    #[test]
    fn error_envelope_carries_stable_code() -> Result<()> {
        let value = serde_json::to_value(ApiResponse::error(ErrorCode::AccountNotActivated))?;
        assert_eq!(value.get("code").and_then(serde_json::Value::as_u64), Some(1));
        assert_eq!(
            value.get("status").and_then(serde_json::Value::as_str),
            Some("error")
        );
        assert_eq!(
            value.get("message").and_then(serde_json::Value::as_str),
            Some("account is not activated")
        );
        Ok(())
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ErrorCode::Ok.code(), 0);
        assert_eq!(ErrorCode::CodeExpired.code(), 6);
        assert_eq!(ErrorCode::InvalidCode.code(), 7);
        assert_eq!(ErrorCode::ActionMismatch.code(), 11);
    }

    #[test]
    fn token_pair_serializes_both_tokens() -> Result<()> {
        let pair = TokenPairResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let value = serde_json::to_value(&pair)?;
        assert_eq!(
            value.get("access_token").and_then(serde_json::Value::as_str),
            Some("a")
        );
        assert_eq!(
            value.get("refresh_token").and_then(serde_json::Value::as_str),
            Some("r")
        );
        Ok(())
    }
}
