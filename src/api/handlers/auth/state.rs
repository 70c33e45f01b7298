//! Auth state and configuration.

use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::users::password::PasswordParams;

use super::rate_limit::RateLimiter;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_ADMIN_TTL_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;
const DEFAULT_VERIFICATION_TTL_HOURS: i64 = 24;
const DEFAULT_OTP_CODE_LENGTH: usize = 6;
const DEFAULT_OTP_TTL_MINUTES: i64 = 5;
const DEFAULT_OTP_MAX_ATTEMPTS: i32 = 3;
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5500";
const PRODUCTION: &str = "production";

/// Secrets that ship in examples and must never reach production.
const KNOWN_DEV_SECRETS: &[&str] = &["dev-secret", "changeme", "secret"];
const MIN_PRODUCTION_SECRET_LENGTH: usize = 32;

#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    frontend_base_url: String,
    environment: String,
    access_ttl_minutes: i64,
    admin_ttl_minutes: i64,
    refresh_ttl_days: i64,
    verification_ttl_hours: i64,
    auto_verify: bool,
    verification_required: bool,
    otp_on_login: bool,
    rotate_refresh_tokens: bool,
    otp_code_length: usize,
    otp_ttl_minutes: i64,
    otp_max_attempts: i32,
    password_params: PasswordParams,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
            environment: "development".to_string(),
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            admin_ttl_minutes: DEFAULT_ADMIN_TTL_MINUTES,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            verification_ttl_hours: DEFAULT_VERIFICATION_TTL_HOURS,
            auto_verify: false,
            verification_required: true,
            otp_on_login: false,
            rotate_refresh_tokens: false,
            otp_code_length: DEFAULT_OTP_CODE_LENGTH,
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            password_params: PasswordParams::default(),
        }
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: String) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: String) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_access_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_admin_ttl_minutes(mut self, minutes: i64) -> Self {
        self.admin_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_days(mut self, days: i64) -> Self {
        self.refresh_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_verification_ttl_hours(mut self, hours: i64) -> Self {
        self.verification_ttl_hours = hours;
        self
    }

    #[must_use]
    pub fn with_auto_verify(mut self, auto_verify: bool) -> Self {
        self.auto_verify = auto_verify;
        self
    }

    #[must_use]
    pub fn with_verification_required(mut self, required: bool) -> Self {
        self.verification_required = required;
        self
    }

    #[must_use]
    pub fn with_otp_on_login(mut self, enabled: bool) -> Self {
        self.otp_on_login = enabled;
        self
    }

    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, enabled: bool) -> Self {
        self.rotate_refresh_tokens = enabled;
        self
    }

    #[must_use]
    pub fn with_otp_code_length(mut self, length: usize) -> Self {
        self.otp_code_length = length;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_minutes(mut self, minutes: i64) -> Self {
        self.otp_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_otp_max_attempts(mut self, attempts: i32) -> Self {
        self.otp_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_password_params(mut self, params: PasswordParams) -> Self {
        self.password_params = params;
        self
    }

    pub(crate) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }

    pub(crate) fn access_ttl_minutes(&self) -> i64 {
        self.access_ttl_minutes
    }

    pub(crate) fn admin_ttl_minutes(&self) -> i64 {
        self.admin_ttl_minutes
    }

    pub(crate) fn refresh_ttl_days(&self) -> i64 {
        self.refresh_ttl_days
    }

    pub(crate) fn verification_ttl_hours(&self) -> i64 {
        self.verification_ttl_hours
    }

    pub(crate) fn auto_verify(&self) -> bool {
        self.auto_verify
    }

    pub(crate) fn verification_required(&self) -> bool {
        self.verification_required
    }

    pub(crate) fn otp_on_login(&self) -> bool {
        self.otp_on_login
    }

    pub(crate) fn rotate_refresh_tokens(&self) -> bool {
        self.rotate_refresh_tokens
    }

    pub(crate) fn otp_code_length(&self) -> usize {
        self.otp_code_length
    }

    pub(crate) fn otp_ttl_minutes(&self) -> i64 {
        self.otp_ttl_minutes
    }

    pub(crate) fn otp_max_attempts(&self) -> i32 {
        self.otp_max_attempts
    }

    pub(crate) fn password_params(&self) -> PasswordParams {
        self.password_params
    }

    /// Startup gate for production deployments. Collects every problem so an
    /// operator fixes the configuration in one pass.
    ///
    /// # Errors
    /// Returns an error listing each violation when running in production.
    pub fn validate(&self) -> Result<()> {
        if !self.is_production() {
            return Ok(());
        }

        let mut problems = Vec::new();
        let secret = self.jwt_secret.expose_secret();

        if secret.len() < MIN_PRODUCTION_SECRET_LENGTH {
            problems.push(format!(
                "JWT secret must be at least {MIN_PRODUCTION_SECRET_LENGTH} characters"
            ));
        }

        if KNOWN_DEV_SECRETS.contains(&secret) {
            problems.push("JWT secret is a known development default".to_string());
        }

        if !self.frontend_base_url.starts_with("https://") {
            problems.push(format!(
                "frontend base URL must use https in production, got {}",
                self.frontend_base_url
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            bail!("Invalid production configuration: {}", problems.join("; "));
        }
    }
}

pub struct AuthState {
    config: AuthConfig,
    auth: AuthService,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(config: AuthConfig, auth: AuthService, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            auth,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(secret("dev-secret"));

        assert_eq!(config.frontend_base_url(), DEFAULT_FRONTEND_BASE_URL);
        assert_eq!(config.access_ttl_minutes(), DEFAULT_ACCESS_TTL_MINUTES);
        assert_eq!(config.admin_ttl_minutes(), DEFAULT_ADMIN_TTL_MINUTES);
        assert_eq!(config.refresh_ttl_days(), DEFAULT_REFRESH_TTL_DAYS);
        assert_eq!(
            config.verification_ttl_hours(),
            DEFAULT_VERIFICATION_TTL_HOURS
        );
        assert_eq!(config.otp_code_length(), DEFAULT_OTP_CODE_LENGTH);
        assert_eq!(config.otp_ttl_minutes(), DEFAULT_OTP_TTL_MINUTES);
        assert_eq!(config.otp_max_attempts(), DEFAULT_OTP_MAX_ATTEMPTS);
        assert!(!config.auto_verify());
        assert!(config.verification_required());
        assert!(!config.otp_on_login());
        assert!(!config.rotate_refresh_tokens());
        assert!(!config.is_production());

        let config = config
            .with_frontend_base_url("https://app.example.com".to_string())
            .with_environment("production".to_string())
            .with_access_ttl_minutes(5)
            .with_admin_ttl_minutes(10)
            .with_refresh_ttl_days(7)
            .with_verification_ttl_hours(1)
            .with_auto_verify(true)
            .with_verification_required(false)
            .with_otp_on_login(true)
            .with_rotate_refresh_tokens(true)
            .with_otp_code_length(8)
            .with_otp_ttl_minutes(10)
            .with_otp_max_attempts(5);

        assert_eq!(config.frontend_base_url(), "https://app.example.com");
        assert!(config.is_production());
        assert_eq!(config.access_ttl_minutes(), 5);
        assert_eq!(config.admin_ttl_minutes(), 10);
        assert_eq!(config.refresh_ttl_days(), 7);
        assert_eq!(config.verification_ttl_hours(), 1);
        assert!(config.auto_verify());
        assert!(!config.verification_required());
        assert!(config.otp_on_login());
        assert!(config.rotate_refresh_tokens());
        assert_eq!(config.otp_code_length(), 8);
        assert_eq!(config.otp_ttl_minutes(), 10);
        assert_eq!(config.otp_max_attempts(), 5);
    }

    #[test]
    fn validate_passes_outside_production() {
        let config = AuthConfig::new(secret("dev-secret"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_weak_production_config() {
        let config = AuthConfig::new(secret("dev-secret"))
            .with_environment("production".to_string())
            .with_frontend_base_url("http://app.example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at least 32 characters"));
        assert!(err.contains("known development default"));
        assert!(err.contains("https"));
    }

    #[test]
    fn validate_accepts_strong_production_config() {
        let config = AuthConfig::new(secret(&"s".repeat(48)))
            .with_environment("production".to_string())
            .with_frontend_base_url("https://app.example.com".to_string());

        assert!(config.validate().is_ok());
    }
}
