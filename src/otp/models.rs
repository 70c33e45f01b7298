use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// What a one-time code is allowed to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Login,
    PasswordReset,
}

impl OtpPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Parse the persisted `otp_attempts.purpose` textual value.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "login" => Ok(Self::Login),
            "password_reset" => Ok(Self::PasswordReset),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid otp_attempts.purpose value: {value}"),
            )))),
        }
    }
}

/// One issued code challenge. Rows are never deleted; expired and verified
/// challenges simply stop matching.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub otp_hash: String,
    pub purpose: OtpPurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub device_info: Option<String>,
}

impl OtpChallenge {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl<'r> FromRow<'r, PgRow> for OtpChallenge {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let purpose: String = row.try_get("purpose")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            otp_hash: row.try_get("otp_hash")?,
            purpose: OtpPurpose::from_db(&purpose)?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            attempts: row.try_get("attempts")?,
            verified: row.try_get("verified")?,
            verified_at: row.try_get("verified_at")?,
            ip_address: row.try_get("ip_address")?,
            device_info: row.try_get("device_info")?,
        })
    }
}
