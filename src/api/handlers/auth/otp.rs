//! Login OTP verification endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::utils::extract_client_ip;

use super::device_info;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::types::{AuthResponse, VerifyOtpRequest};

/// Redeem a login OTP challenge and finish signing in.
///
/// Failed codes burn an attempt; the challenge locks once the attempt
/// budget is spent.
#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Invalid payload or spent challenge"),
        (status = 401, description = "Wrong code"),
        (status = 404, description = "Unknown challenge"),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Ok(otp_id) = Uuid::parse_str(request.otp_id.trim()) else {
        return (StatusCode::BAD_REQUEST, "Invalid otp id".to_string()).into_response();
    };

    let code = request.code.trim();
    if code.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing code".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::VerifyOtp)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ip = client_ip.as_deref().unwrap_or("unknown");
    let device = device_info(&headers);

    match auth_state
        .auth()
        .verify_login_otp(otp_id, code, ip, device.as_deref())
        .await
    {
        Ok(signed_in) => {
            let body = AuthResponse::new(
                &signed_in.user,
                signed_in.access_token,
                signed_in.refresh_token,
                None,
            );
            Json(body).into_response()
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
    async fn verify_otp_requires_payload() -> Result<()> {
        let state = test_state()?;
        let response = verify_otp(HeaderMap::new(), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_malformed_challenge_id() -> Result<()> {
        let state = test_state()?;
        let payload = VerifyOtpRequest {
            otp_id: "not-a-uuid".to_string(),
            code: "123456".to_string(),
        };
        let response = verify_otp(HeaderMap::new(), Extension(state), Some(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_blank_code() -> Result<()> {
        let state = test_state()?;
        let payload = VerifyOtpRequest {
            otp_id: Uuid::new_v4().to_string(),
            code: "  ".to_string(),
        };
        let response = verify_otp(HeaderMap::new(), Extension(state), Some(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
