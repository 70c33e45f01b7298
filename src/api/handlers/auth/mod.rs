//! HTTP surface of the auth service.
//!
//! Handlers stay thin: they check payload shape, apply rate limits and
//! delegate to [`crate::auth::AuthService`], which owns every decision
//! worth auditing. Error bodies come from [`crate::auth::AuthError`] so
//! the wire never leaks more than a reason code.

use axum::http::{HeaderMap, header::USER_AGENT};

pub(crate) mod login;
pub(crate) mod otp;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod types;
pub(crate) mod verification;

pub use rate_limit::{NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter};
pub use state::{AuthConfig, AuthState};

/// Shortest password accepted at registration.
pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw `User-Agent` value, recorded against sessions and login logs.
fn device_info(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) fn test_state() -> anyhow::Result<std::sync::Arc<AuthState>> {
    use crate::auth::AuthService;
    use crate::email::{LogEmailSender, Mailer};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
    let config = AuthConfig::new(SecretString::from("test-secret".to_string()));
    let mailer = Mailer::new(Arc::new(LogEmailSender), false, config.frontend_base_url());
    let auth = AuthService::new(pool, config.clone(), mailer);
    Ok(Arc::new(AuthState::new(
        config,
        auth,
        Arc::new(NoopRateLimiter),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn device_info_reads_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.5.0"));
        assert_eq!(device_info(&headers), Some("curl/8.5.0".to_string()));
        assert_eq!(device_info(&HeaderMap::new()), None);
    }
}
