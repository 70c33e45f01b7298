//! Account registration endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::utils::{extract_client_ip, normalize_email, valid_email};

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::types::{AuthResponse, RegisterRequest};
use super::{MIN_PASSWORD_LENGTH, device_info};

/// Create an account, sign it in, and (unless auto-verify is on) start email
/// verification.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid payload or email already registered"),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    // Rate limits are enforced before any credential work.
    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ip = client_ip.as_deref().unwrap_or("unknown");
    let device = device_info(&headers);

    match auth_state
        .auth()
        .register(&email, &request.password, ip, device.as_deref())
        .await
    {
        Ok(registration) => {
            let body = AuthResponse::new(
                &registration.signed_in.user,
                registration.signed_in.access_token,
                registration.signed_in.refresh_token,
                registration.verification_token,
            );
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::test_state;
    use anyhow::Result;

    #[tokio::test]
    async fn register_requires_payload() -> Result<()> {
        let state = test_state()?;
        let response = register(HeaderMap::new(), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() -> Result<()> {
        let state = test_state()?;
        let payload = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "longenoughpassword".to_string(),
        };
        let response = register(HeaderMap::new(), Extension(state), Some(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_short_password() -> Result<()> {
        let state = test_state()?;
        let payload = RegisterRequest {
            email: "alice@example.com".to_string(),
            password: "short".to_string(),
        };
        let response = register(HeaderMap::new(), Extension(state), Some(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
