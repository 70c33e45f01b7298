use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// Why a session stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeReason {
    Logout,
    LogoutAll,
    AdminAction,
    Security,
}

impl RevokeReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::LogoutAll => "logout_all",
            Self::AdminAction => "admin_action",
            Self::Security => "security",
        }
    }

    /// Parse the persisted `sessions.revoked_reason` textual value.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "logout" => Ok(Self::Logout),
            "logout_all" => Ok(Self::LogoutAll),
            "admin_action" => Ok(Self::AdminAction),
            "security" => Ok(Self::Security),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid sessions.revoked_reason value: {value}"),
            )))),
        }
    }
}

/// One refresh-token grant. The raw refresh token never reaches the
/// database; only its hash is stored and matched.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<RevokeReason>,
}

impl Session {
    /// A session is valid only while not revoked and not past expiry.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

impl<'r> FromRow<'r, PgRow> for Session {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let revoked_reason: Option<String> = row.try_get("revoked_reason")?;
        let revoked_reason = revoked_reason
            .as_deref()
            .map(RevokeReason::from_db)
            .transpose()?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            refresh_token_hash: row.try_get("refresh_token_hash")?,
            device_info: row.try_get("device_info")?,
            ip_address: row.try_get("ip_address")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            last_used_at: row.try_get("last_used_at")?,
            revoked: row.try_get("revoked")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_reason,
        })
    }
}
