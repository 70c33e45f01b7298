//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::LoginLog;
use crate::session::Session;
use crate::users::User;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub otp_id: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
    pub created_at: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Bundle returned by register, login and OTP completion. The verification
/// token only appears on registration in non-production environments.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

impl AuthResponse {
    pub(crate) fn new(
        user: &User,
        access_token: String,
        refresh_token: String,
        verification_token: Option<String>,
    ) -> Self {
        Self {
            user: UserView::from(user),
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            verification_token,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifiedResponse {
    pub user: UserView,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpRequiredResponse {
    pub otp_required: bool,
    pub otp_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionView {
    pub id: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
    pub last_used_at: String,
    pub expires_at: String,
    pub current: bool,
}

impl SessionView {
    pub(crate) fn new(session: &Session, current: bool) -> Self {
        Self {
            id: session.id.to_string(),
            device_info: session.device_info.clone(),
            ip_address: session.ip_address.clone(),
            created_at: session.created_at.to_rfc3339(),
            last_used_at: session.last_used_at.to_rfc3339(),
            expires_at: session.expires_at.to_rfc3339(),
            current,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AdminLoginResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DisableUserRequest {
    pub reason: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RevokedSessionsResponse {
    pub revoked: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginLogView {
    pub id: String,
    pub email: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: String,
    pub device_info: Option<String>,
    pub timestamp: String,
}

impl From<&LoginLog> for LoginLogView {
    fn from(log: &LoginLog) -> Self {
        Self {
            id: log.id.to_string(),
            email: log.email.clone(),
            success: log.success,
            failure_reason: log.failure_reason.map(|reason| reason.as_str().to_string()),
            ip_address: log.ip_address.clone(),
            device_info: log.device_info.clone(),
            timestamp: log.timestamp.to_rfc3339(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginLogsResponse {
    pub logs: Vec<LoginLogView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            email_verified: true,
            email_verified_at: Some(now),
            disabled: false,
            disabled_at: None,
            disabled_reason: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            email: "alice@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.password, "hunter2hunter2");
        Ok(())
    }

    #[test]
    fn auth_response_skips_missing_verification_token() -> Result<()> {
        let user = sample_user();
        let response = AuthResponse::new(&user, "acc".to_string(), "ref".to_string(), None);
        let value = serde_json::to_value(&response)?;

        assert!(value.get("verification_token").is_none());
        let token_type = value
            .get("token_type")
            .and_then(serde_json::Value::as_str)
            .context("missing token_type")?;
        assert_eq!(token_type, "bearer");
        Ok(())
    }

    #[test]
    fn auth_response_carries_verification_token_when_present() -> Result<()> {
        let user = sample_user();
        let response = AuthResponse::new(
            &user,
            "acc".to_string(),
            "ref".to_string(),
            Some("raw-token".to_string()),
        );
        let value = serde_json::to_value(&response)?;

        let token = value
            .get("verification_token")
            .and_then(serde_json::Value::as_str)
            .context("missing verification_token")?;
        assert_eq!(token, "raw-token");
        Ok(())
    }

    #[test]
    fn user_view_carries_rfc3339_timestamp() {
        let user = sample_user();
        let view = UserView::from(&user);
        assert_eq!(view.id, user.id.to_string());
        assert!(view.created_at.contains('T'));
    }

    #[test]
    fn session_view_marks_the_current_session() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token_hash: "hash".to_string(),
            device_info: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.9".to_string()),
            created_at: now,
            expires_at: now,
            last_used_at: now,
            revoked: false,
            revoked_at: None,
            revoked_reason: None,
        };

        let view = SessionView::new(&session, true);
        assert!(view.current);
        assert_eq!(view.id, session.id.to_string());
        assert_eq!(view.device_info.as_deref(), Some("Mozilla/5.0"));
        assert!(view.last_used_at.contains('T'));
    }
}
