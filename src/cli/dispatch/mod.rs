//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary should execute,
//! currently always the API server.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: SecretString::from(auth_opts.jwt_secret),
        frontend_base_url: auth_opts.frontend_base_url,
        environment: auth_opts.environment,
        access_ttl_minutes: auth_opts.access_ttl_minutes,
        admin_ttl_minutes: auth_opts.admin_ttl_minutes,
        refresh_ttl_days: auth_opts.refresh_ttl_days,
        verification_ttl_hours: auth_opts.verification_ttl_hours,
        auto_verify: auth_opts.auto_verify,
        verification_required: auth_opts.verification_required,
        otp_on_login: auth_opts.otp_on_login,
        rotate_refresh_tokens: auth_opts.rotate_refresh_tokens,
        otp_code_length: auth_opts.otp_code_length,
        otp_ttl_minutes: auth_opts.otp_ttl_minutes,
        otp_max_attempts: auth_opts.otp_max_attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_secret_required() {
        temp_env::with_vars(
            [
                ("SYNCVEIL_JWT_SECRET", Some("")),
                (
                    "SYNCVEIL_DSN",
                    Some("postgres://user@localhost:5432/syncveil"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["syncveil"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --jwt-secret")
                    );
                }
            },
        );
    }

    #[test]
    fn defaults_flow_into_server_args() {
        temp_env::with_vars(
            [
                ("SYNCVEIL_JWT_SECRET", Some("not-a-production-secret")),
                (
                    "SYNCVEIL_DSN",
                    Some("postgres://user@localhost:5432/syncveil"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["syncveil"]);
                let action = handler(&matches).expect("handler should succeed");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.access_ttl_minutes, 15);
                assert_eq!(args.admin_ttl_minutes, 30);
                assert_eq!(args.refresh_ttl_days, 30);
                assert_eq!(args.verification_ttl_hours, 24);
                assert_eq!(args.otp_code_length, 6);
                assert!(!args.auto_verify);
                assert!(args.verification_required);
                assert!(!args.otp_on_login);
                assert!(!args.rotate_refresh_tokens);
            },
        );
    }
}
