use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_REMEMBER_ME_TTL_SECONDS: &str = "remember-me-ttl-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub session_ttl_seconds: i64,
    pub remember_me_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub password_min_length: usize,
}

impl Options {
    /// # Errors
    /// Returns an error if an argument is missing or not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .context("missing required argument: --session-ttl-seconds")?;
        let remember_me_ttl_seconds = matches
            .get_one::<i64>(ARG_REMEMBER_ME_TTL_SECONDS)
            .copied()
            .context("missing required argument: --remember-me-ttl-seconds")?;
        let password_min_length = matches
            .get_one::<usize>(ARG_PASSWORD_MIN_LENGTH)
            .copied()
            .context("missing required argument: --password-min-length")?;

        Ok(Self {
            session_ttl_seconds,
            remember_me_ttl_seconds,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            password_min_length,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Lifetime of a regular sign-in session in seconds")
                .env("MYNOTES_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REMEMBER_ME_TTL_SECONDS)
                .long(ARG_REMEMBER_ME_TTL_SECONDS)
                .help("Lifetime of a \"Remember me\" session in seconds")
                .env("MYNOTES_REMEMBER_ME_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark cookies Secure (serve over HTTPS)")
                .env("MYNOTES_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long(ARG_PASSWORD_MIN_LENGTH)
                .help("Minimum password length")
                .env("MYNOTES_PASSWORD_MIN_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(usize)),
        )
}
