pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        jwt_secret: SecretString,
        confirm_ttl_seconds: i64,
        access_ttl_minutes: i64,
        refresh_ttl_minutes: i64,
    },
}
