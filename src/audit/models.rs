use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// Why a login attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    InvalidCredentials,
    EmailNotVerified,
    AccountDisabled,
    OtpFailed,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::EmailNotVerified => "email_not_verified",
            Self::AccountDisabled => "account_disabled",
            Self::OtpFailed => "otp_failed",
        }
    }

    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "invalid_credentials" => Ok(Self::InvalidCredentials),
            "email_not_verified" => Ok(Self::EmailNotVerified),
            "account_disabled" => Ok(Self::AccountDisabled),
            "otp_failed" => Ok(Self::OtpFailed),
            other => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown failure reason: {other}"),
            )))),
        }
    }
}

/// One login attempt, successful or not. `user_id` goes `NULL` if the user
/// is later removed; the row itself stays.
#[derive(Debug, Clone)]
pub struct LoginLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub ip_address: String,
    pub device_info: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LoginLog {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let failure_reason: Option<String> = row.try_get("failure_reason")?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            email: row.try_get("email")?,
            success: row.try_get("success")?,
            failure_reason: failure_reason
                .as_deref()
                .map(FailureReason::from_db)
                .transpose()?,
            ip_address: row.try_get("ip_address")?,
            device_info: row.try_get("device_info")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}
