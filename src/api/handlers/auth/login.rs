//! Password login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::LoginOutcome;
use crate::utils::{extract_client_ip, normalize_email, valid_email};

use super::device_info;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::types::{AuthResponse, LoginRequest, OtpRequiredResponse};

/// Authenticate with email and password.
///
/// Answers 200 with tokens, or 202 with an OTP challenge id when the
/// deployment requires a second factor on login.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 202, description = "OTP challenge issued", body = OtpRequiredResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified"),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) || request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid credentials payload".to_string())
            .into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ip = client_ip.as_deref().unwrap_or("unknown");
    let device = device_info(&headers);

    match auth_state
        .auth()
        .login(&email, &request.password, ip, device.as_deref())
        .await
    {
        Ok(LoginOutcome::SignedIn(signed_in)) => {
            let body = AuthResponse::new(
                &signed_in.user,
                signed_in.access_token,
                signed_in.refresh_token,
                None,
            );
            Json(body).into_response()
        }
        Ok(LoginOutcome::OtpRequired { otp_id }) => (
            StatusCode::ACCEPTED,
            Json(OtpRequiredResponse {
                otp_required: true,
                otp_id: otp_id.to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::test_state;
    use anyhow::Result;

    #[tokio::test]
    async fn login_requires_payload() -> Result<()> {
        let state = test_state()?;
        let response = login(HeaderMap::new(), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_empty_password() -> Result<()> {
        let state = test_state()?;
        let payload = LoginRequest {
            email: "alice@example.com".to_string(),
            password: String::new(),
        };
        let response = login(HeaderMap::new(), Extension(state), Some(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
