use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::otp::models::{OtpChallenge, OtpPurpose};

/// A successfully claimed verification attempt.
pub struct ClaimedAttempt {
    pub attempts: i32,
    pub otp_hash: String,
}

pub struct OtpRepo;

impl OtpRepo {
    /// Insert a fresh challenge row with `attempts = 0`.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(
        pool: &PgPool,
        user_id: Uuid,
        otp_hash: &str,
        purpose: OtpPurpose,
        ttl_minutes: i64,
        ip_address: Option<&str>,
        device_info: Option<&str>,
    ) -> Result<OtpChallenge> {
        let expires_at: DateTime<Utc> = Utc::now() + Duration::minutes(ttl_minutes);
        sqlx::query_as::<_, OtpChallenge>(
            r"
            INSERT INTO otp_attempts
                (id, user_id, otp_hash, purpose, expires_at, ip_address, device_info)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(otp_hash)
        .bind(purpose.as_str())
        .bind(expires_at)
        .bind(ip_address)
        .bind(device_info)
        .fetch_one(pool)
        .await
        .context("Failed to insert OTP challenge")
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find(pool: &PgPool, challenge_id: Uuid) -> Result<Option<OtpChallenge>> {
        sqlx::query_as::<_, OtpChallenge>("SELECT * FROM otp_attempts WHERE id = $1")
            .bind(challenge_id)
            .fetch_optional(pool)
            .await
            .context("Failed to fetch OTP challenge")
    }

    /// Atomically consume one verification attempt. Returns `None` when the
    /// row is no longer claimable (verified, expired, or at the cap), which
    /// also settles concurrent submissions racing for the last attempt.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn claim_attempt(
        pool: &PgPool,
        challenge_id: Uuid,
        max_attempts: i32,
    ) -> Result<Option<ClaimedAttempt>> {
        let row = sqlx::query(
            r"
            UPDATE otp_attempts
            SET attempts = attempts + 1
            WHERE id = $1
              AND verified = FALSE
              AND expires_at > NOW()
              AND attempts < $2
            RETURNING attempts, otp_hash
            ",
        )
        .bind(challenge_id)
        .bind(max_attempts)
        .fetch_optional(pool)
        .await
        .context("Failed to claim OTP attempt")?;

        Ok(row.map(|row| ClaimedAttempt {
            attempts: row.get("attempts"),
            otp_hash: row.get("otp_hash"),
        }))
    }

    /// Mark a challenge as verified. Terminal: the row never matches again.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_verified(pool: &PgPool, challenge_id: Uuid) -> Result<()> {
        sqlx::query(
            r"
            UPDATE otp_attempts
            SET verified = TRUE, verified_at = NOW()
            WHERE id = $1 AND verified = FALSE
            ",
        )
        .bind(challenge_id)
        .execute(pool)
        .await
        .context("Failed to mark OTP challenge verified")?;
        Ok(())
    }
}
