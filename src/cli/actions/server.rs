use crate::api;
use crate::api::email::EmailWorkerConfig;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            jwt_secret,
            confirm_ttl_seconds,
            access_ttl_minutes,
            refresh_ttl_minutes,
        } => {
            // Fail early on malformed connection strings.
            let dsn = Url::parse(&dsn)?;

            let auth_config = AuthConfig::new(jwt_secret)
                .with_confirm_ttl_seconds(confirm_ttl_seconds)
                .with_access_ttl_minutes(access_ttl_minutes)
                .with_refresh_ttl_minutes(refresh_ttl_minutes);

            api::new(port, dsn.to_string(), auth_config, EmailWorkerConfig::new()).await?;
        }
    }

    Ok(())
}
