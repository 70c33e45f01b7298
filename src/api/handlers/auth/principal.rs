//! Authenticated principal extraction for protected endpoints.
//!
//! Flow overview: read the `Authorization` bearer token, resolve it through
//! the orchestrator, and hand downstream handlers a principal (or an admin
//! account for the admin surface).

use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::admin::AdminUser;
use crate::auth::{AuthError, Principal};

use super::state::AuthState;

/// Pull the bearer token out of the `Authorization` header.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();

    if token.is_empty() { None } else { Some(token) }
}

/// Resolve the bearer token into a principal, or fail with the same 401 for
/// every cause.
///
/// # Errors
/// `Unauthorized` when the header is missing or the token does not resolve.
pub async fn require_auth(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<Principal, AuthError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(AuthError::Unauthorized("missing_bearer_token"));
    };

    auth_state.auth().authenticate(token).await
}

/// Resolve the bearer token into an admin account.
///
/// # Errors
/// `Unauthorized` when the header is missing or the token is not an admin
/// token.
pub async fn require_admin(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<AdminUser, AuthError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(AuthError::Unauthorized("missing_bearer_token"));
    };

    auth_state.auth().authenticate_admin(token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn accepts_lowercase_scheme() {
        let headers = headers_with("bearer abc");
        assert_eq!(extract_bearer_token(&headers), Some("abc"));
    }

    #[test]
    fn rejects_missing_header() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn rejects_empty_token() {
        let headers = headers_with("Bearer   ");
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn rejects_other_schemes() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
