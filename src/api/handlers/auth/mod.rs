//! Auth handlers and supporting modules.
//!
//! This module coordinates credential verification, token-pair issuance,
//! fingerprint-bound sessions, and the confirmation-code flows behind
//! account activation and password recovery.
//!
//! ## Session fingerprints
//!
//! A session is keyed by (device class, IP, user agent). Login enforces a
//! single session per fingerprint; refresh rotates a session's token pair in
//! one transaction.
//!
//! ## Confirmation codes
//!
//! Six-digit codes are scoped to the flow that issued them (`registration`
//! or `forgot`) and expire after the configured TTL. The code, its action
//! scope, and its issue timestamp always move together.

mod codes;
mod device;
mod password;
pub(crate) mod recovery;
pub(crate) mod registration;
pub(crate) mod session;
mod state;
mod storage;
mod tokens;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
