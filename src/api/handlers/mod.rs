//! API handlers.

pub mod auth;
pub mod health;

pub use auth::{AuthConfig, AuthState};
