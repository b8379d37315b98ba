//! `OpenAPI` document for the service.
//!
//! New endpoints are registered here so the served routes and the generated
//! spec stay in one place.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use super::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::session::login,
        auth::session::logout,
        auth::session::refresh,
        auth::session::verify,
        auth::session::sessions,
        auth::session::destroy_session,
        auth::registration::registration,
        auth::registration::activation,
        auth::recovery::forgot,
        auth::recovery::recovery,
        auth::recovery::confirm_check,
        auth::recovery::resend,
    ),
    components(schemas(
        health::Health,
        auth::types::ApiResponse,
        auth::types::ResponseStatus,
        auth::types::LoginRequest,
        auth::types::RegistrationRequest,
        auth::types::ActivationRequest,
        auth::types::ForgotRequest,
        auth::types::RecoveryRequest,
        auth::types::ConfirmCheckRequest,
        auth::types::ResendRequest,
        auth::types::TokenPairResponse,
        auth::types::SessionInfo,
        auth::types::SessionListResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication and session lifecycle"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_auth_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/health",
            "/v1/auth/login",
            "/v1/auth/logout",
            "/v1/auth/refresh",
            "/v1/auth/verify",
            "/v1/auth/sessions",
            "/v1/auth/sessions/{id}",
            "/v1/auth/registration",
            "/v1/auth/activation",
            "/v1/auth/forgot",
            "/v1/auth/recovery",
            "/v1/auth/confirm-check",
            "/v1/auth/resend/{section}",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "missing path: {path}"
            );
        }
    }

    #[test]
    fn document_declares_bearer_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn document_tags() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "health"));
    }
}
