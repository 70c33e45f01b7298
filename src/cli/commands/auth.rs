use anyhow::bail;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_ACCESS_TTL_MINUTES: &str = "access-ttl-minutes";
pub const ARG_ADMIN_TTL_MINUTES: &str = "admin-ttl-minutes";
pub const ARG_REFRESH_TTL_DAYS: &str = "refresh-ttl-days";
pub const ARG_VERIFICATION_TTL_HOURS: &str = "verification-ttl-hours";
pub const ARG_AUTO_VERIFY: &str = "auto-verify";
pub const ARG_NO_VERIFICATION_GATE: &str = "no-verification-gate";
pub const ARG_OTP_ON_LOGIN: &str = "otp-on-login";
pub const ARG_ROTATE_REFRESH_TOKENS: &str = "rotate-refresh-tokens";
pub const ARG_OTP_CODE_LENGTH: &str = "otp-code-length";
pub const ARG_OTP_TTL_MINUTES: &str = "otp-ttl-minutes";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";

/// Auth settings extracted from CLI matches, ready to feed `AuthConfig`.
#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: String,
    pub frontend_base_url: String,
    pub environment: String,
    pub access_ttl_minutes: i64,
    pub admin_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub verification_ttl_hours: i64,
    pub auto_verify: bool,
    pub verification_required: bool,
    pub otp_on_login: bool,
    pub rotate_refresh_tokens: bool,
    pub otp_code_length: usize,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: i32,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Filter empty strings which clap can pass through when env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|value| !value.trim().is_empty())
        };

        let Some(jwt_secret) = get_non_empty(ARG_JWT_SECRET) else {
            bail!("missing required argument: --{ARG_JWT_SECRET}");
        };
        let Some(frontend_base_url) = get_non_empty(ARG_FRONTEND_BASE_URL) else {
            bail!("missing required argument: --{ARG_FRONTEND_BASE_URL}");
        };
        let Some(environment) = get_non_empty(ARG_ENVIRONMENT) else {
            bail!("missing required argument: --{ARG_ENVIRONMENT}");
        };

        Ok(Self {
            jwt_secret,
            frontend_base_url,
            environment,
            access_ttl_minutes: matches
                .get_one::<i64>(ARG_ACCESS_TTL_MINUTES)
                .copied()
                .unwrap_or(15),
            admin_ttl_minutes: matches
                .get_one::<i64>(ARG_ADMIN_TTL_MINUTES)
                .copied()
                .unwrap_or(30),
            refresh_ttl_days: matches
                .get_one::<i64>(ARG_REFRESH_TTL_DAYS)
                .copied()
                .unwrap_or(30),
            verification_ttl_hours: matches
                .get_one::<i64>(ARG_VERIFICATION_TTL_HOURS)
                .copied()
                .unwrap_or(24),
            auto_verify: matches.get_flag(ARG_AUTO_VERIFY),
            verification_required: !matches.get_flag(ARG_NO_VERIFICATION_GATE),
            otp_on_login: matches.get_flag(ARG_OTP_ON_LOGIN),
            rotate_refresh_tokens: matches.get_flag(ARG_ROTATE_REFRESH_TOKENS),
            otp_code_length: matches
                .get_one::<usize>(ARG_OTP_CODE_LENGTH)
                .copied()
                .unwrap_or(6),
            otp_ttl_minutes: matches
                .get_one::<i64>(ARG_OTP_TTL_MINUTES)
                .copied()
                .unwrap_or(5),
            otp_max_attempts: matches
                .get_one::<i32>(ARG_OTP_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(3),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_verification_args(command);
    with_otp_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing secret for access and refresh tokens")
                .env("SYNCVEIL_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment; 'production' enables config hardening checks")
                .env("SYNCVEIL_ENVIRONMENT")
                .default_value("development"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_MINUTES)
                .long(ARG_ACCESS_TTL_MINUTES)
                .help("Access token lifetime in minutes")
                .env("SYNCVEIL_ACCESS_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ADMIN_TTL_MINUTES)
                .long(ARG_ADMIN_TTL_MINUTES)
                .help("Admin token lifetime in minutes")
                .env("SYNCVEIL_ADMIN_TTL_MINUTES")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_DAYS)
                .long(ARG_REFRESH_TTL_DAYS)
                .help("Refresh token and session lifetime in days")
                .env("SYNCVEIL_REFRESH_TTL_DAYS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ROTATE_REFRESH_TOKENS)
                .long(ARG_ROTATE_REFRESH_TOKENS)
                .help("Issue a replacement refresh token on every refresh")
                .env("SYNCVEIL_ROTATE_REFRESH_TOKENS")
                .action(ArgAction::SetTrue),
        )
}

fn with_verification_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for verification links and CORS")
                .env("SYNCVEIL_FRONTEND_BASE_URL")
                .default_value("http://localhost:5500"),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_TTL_HOURS)
                .long(ARG_VERIFICATION_TTL_HOURS)
                .help("Email verification token lifetime in hours")
                .env("SYNCVEIL_VERIFICATION_TTL_HOURS")
                .default_value("24")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_AUTO_VERIFY)
                .long(ARG_AUTO_VERIFY)
                .help("Mark new accounts as verified without sending email")
                .env("SYNCVEIL_AUTO_VERIFY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_NO_VERIFICATION_GATE)
                .long(ARG_NO_VERIFICATION_GATE)
                .help("Allow login before the email address is verified")
                .env("SYNCVEIL_NO_VERIFICATION_GATE")
                .action(ArgAction::SetTrue),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_ON_LOGIN)
                .long(ARG_OTP_ON_LOGIN)
                .help("Require an emailed one-time code to finish every login")
                .env("SYNCVEIL_OTP_ON_LOGIN")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_OTP_CODE_LENGTH)
                .long(ARG_OTP_CODE_LENGTH)
                .help("Digits in the one-time code")
                .env("SYNCVEIL_OTP_CODE_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_MINUTES)
                .long(ARG_OTP_TTL_MINUTES)
                .help("One-time code lifetime in minutes")
                .env("SYNCVEIL_OTP_TTL_MINUTES")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Wrong guesses allowed before a code locks")
                .env("SYNCVEIL_OTP_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(i32)),
        )
}
