//! Admin endpoints: operator login and user management.
//!
//! Admin accounts are provisioned out of band and live in their own table;
//! every action here lands in the admin audit log with the caller's id.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::utils::{extract_client_ip, normalize_email, valid_email};

use super::auth::principal::require_admin;
use super::auth::types::{
    AdminLoginRequest, AdminLoginResponse, DisableUserRequest, LoginLogView, LoginLogsResponse,
    RevokedSessionsResponse,
};
use super::auth::{AuthState, RateLimitAction, RateLimitDecision};

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 500;

#[derive(Deserialize, IntoParams, Debug)]
pub struct LoginLogsQuery {
    /// Newest-first page size, capped at 500.
    pub limit: Option<i64>,
}

/// Authenticate an admin and hand out a scoped access token.
///
/// Admin tokens are not session-backed, so there is nothing to refresh or
/// revoke; they simply expire.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin signed in", body = AdminLoginResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "admin"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<AdminLoginRequest>>,
) -> impl IntoResponse {
    let request: AdminLoginRequest = match payload {
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

    match auth_state.auth().admin_login(&email, &request.password).await {
        Ok((_, access_token)) => Json(AdminLoginResponse {
            access_token,
            token_type: "bearer".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Disable a user account and revoke all of its sessions.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/disable",
    request_body = DisableUserRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User disabled"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Unknown user")
    ),
    tag = "admin"
)]
pub async fn disable_user(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(user_id): Path<Uuid>,
    payload: Option<Json<DisableUserRequest>>,
) -> impl IntoResponse {
    let admin = match require_admin(&headers, &auth_state).await {
        Ok(admin) => admin,
        Err(err) => return err.into_response(),
    };

    let reason = payload
        .and_then(|Json(request)| request.reason)
        .unwrap_or_else(|| "admin_action".to_string());
    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    match auth_state
        .auth()
        .admin_disable_user(&admin, user_id, &reason, &ip)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Revoke every active session of a user.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/revoke-sessions",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Sessions revoked", body = RevokedSessionsResponse),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Unknown user")
    ),
    tag = "admin"
)]
pub async fn revoke_sessions(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let admin = match require_admin(&headers, &auth_state).await {
        Ok(admin) => admin,
        Err(err) => return err.into_response(),
    };

    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    match auth_state
        .auth()
        .admin_revoke_sessions(&admin, user_id, &ip)
        .await
    {
        Ok(revoked) => Json(RevokedSessionsResponse { revoked }).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Read a user's login history, newest first.
#[utoipa::path(
    get,
    path = "/admin/users/{id}/login-logs",
    params(
        ("id" = Uuid, Path, description = "User id"),
        LoginLogsQuery
    ),
    responses(
        (status = 200, description = "Login history", body = LoginLogsResponse),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Unknown user")
    ),
    tag = "admin"
)]
pub async fn login_logs(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<LoginLogsQuery>,
) -> impl IntoResponse {
    let admin = match require_admin(&headers, &auth_state).await {
        Ok(admin) => admin,
        Err(err) => return err.into_response(),
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    match auth_state
        .auth()
        .admin_list_login_logs(&admin, user_id, limit, &ip)
        .await
    {
        Ok(logs) => Json(LoginLogsResponse {
            logs: logs.iter().map(LoginLogView::from).collect(),
        })
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
    async fn admin_login_requires_payload() -> Result<()> {
        let state = test_state()?;
        let response = login(HeaderMap::new(), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn disable_user_requires_admin_token() -> Result<()> {
        let state = test_state()?;
        let response = disable_user(
            HeaderMap::new(),
            Extension(state),
            Path(Uuid::new_v4()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_sessions_requires_admin_token() -> Result<()> {
        let state = test_state()?;
        let response = revoke_sessions(HeaderMap::new(), Extension(state), Path(Uuid::new_v4()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
