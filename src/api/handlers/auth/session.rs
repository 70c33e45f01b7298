//! Session lifecycle endpoints: refresh, logout, logout-all and listing.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use super::principal::require_auth;
use super::state::AuthState;
use super::types::{RefreshRequest, RefreshResponse, SessionView, SessionsResponse};

/// Exchange a refresh token for a new access token.
///
/// When rotation is enabled the response also carries a replacement
/// refresh token and the presented one stops working.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New tokens", body = RefreshResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Refresh token unknown, expired or revoked")
    ),
    tag = "auth"
)]
pub async fn refresh(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let refresh_token = request.refresh_token.trim();
    if refresh_token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing refresh token".to_string()).into_response();
    }

    match auth_state.auth().refresh(refresh_token).await {
        Ok(tokens) => Json(RefreshResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "bearer".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Revoke the session behind the presented access token.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match auth_state.auth().logout(&principal).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Revoke every active session of the caller, the current one included.
#[utoipa::path(
    post,
    path = "/auth/logout-all",
    responses(
        (status = 204, description = "All sessions revoked"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn logout_all(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match auth_state.auth().logout_all(&principal).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// List the caller's active sessions, flagging the one behind this request.
#[utoipa::path(
    get,
    path = "/auth/sessions",
    responses(
        (status = 200, description = "Active sessions", body = SessionsResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn sessions(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match auth_state.auth().list_sessions(&principal).await {
        Ok(sessions) => Json(SessionsResponse {
            sessions: sessions
                .iter()
                .map(|session| SessionView::new(session, session.id == principal.session_id))
                .collect(),
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
    async fn refresh_requires_payload() -> Result<()> {
        let state = test_state()?;
        let response = refresh(Extension(state), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_blank_token() -> Result<()> {
        let state = test_state()?;
        let payload = RefreshRequest {
            refresh_token: "  ".to_string(),
        };
        let response = refresh(Extension(state), Some(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn logout_requires_bearer_token() -> Result<()> {
        let state = test_state()?;
        let response = logout(HeaderMap::new(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn sessions_requires_bearer_token() -> Result<()> {
        let state = test_state()?;
        let response = sessions(HeaderMap::new(), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
