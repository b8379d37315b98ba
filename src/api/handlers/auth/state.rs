//! Auth state and configuration.

use secrecy::{ExposeSecret, SecretString};

const DEFAULT_CONFIRM_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_MINUTES: i64 = 43_830;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    confirm_ttl_seconds: i64,
    access_ttl_minutes: i64,
    refresh_ttl_minutes: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            confirm_ttl_seconds: DEFAULT_CONFIRM_TTL_SECONDS,
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_ttl_minutes: DEFAULT_REFRESH_TTL_MINUTES,
        }
    }

    #[must_use]
    pub fn with_confirm_ttl_seconds(mut self, seconds: i64) -> Self {
        self.confirm_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_minutes(mut self, minutes: i64) -> Self {
        self.refresh_ttl_minutes = minutes;
        self
    }

    pub(super) fn jwt_secret(&self) -> &str {
        self.jwt_secret.expose_secret()
    }

    pub(super) fn confirm_ttl_seconds(&self) -> i64 {
        self.confirm_ttl_seconds
    }

    pub(super) fn access_ttl_minutes(&self) -> i64 {
        self.access_ttl_minutes
    }

    pub(super) fn refresh_ttl_minutes(&self) -> i64 {
        self.refresh_ttl_minutes
    }

    pub(super) fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_minutes * 60
    }
}

pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
