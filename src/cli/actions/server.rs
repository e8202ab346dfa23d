use crate::{api, cli::telemetry, identity::IdentityOptions};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub session_ttl_seconds: i64,
    pub remember_me_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub password_min_length: usize,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let options = IdentityOptions::new()
        .with_password_min_length(args.password_min_length)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_remember_me_ttl_seconds(args.remember_me_ttl_seconds);

    debug!("Identity options: {:?}", options);

    let result = api::new(
        args.port,
        args.dsn.expose_secret(),
        options,
        args.cookie_secure,
    )
    .await;

    telemetry::shutdown_tracer();

    result
}
