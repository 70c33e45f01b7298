//! Database access for the session ledger.
//!
//! Rows are never deleted. Logout and admin actions flip the `revoked` flag
//! so the ledger stays usable as an audit trail.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::session::models::{RevokeReason, Session};
use crate::utils::{constant_time_eq, hash_token, is_unique_violation};

/// Outcome when inserting a session row.
#[derive(Debug)]
pub enum CreateSessionOutcome {
    Created(Session),
    Conflict,
}

/// Outcome of checking a presented refresh token against the ledger.
///
/// All rejection causes collapse into `Invalid` so callers cannot probe
/// which part of the check failed.
#[derive(Debug)]
pub enum SessionValidation {
    Valid(Session),
    Invalid,
}

/// What the ledger already knows about a user's devices.
#[derive(Debug, Clone, Copy)]
pub struct DeviceHistory {
    pub has_sessions: bool,
    pub device_seen: bool,
}

pub struct SessionRepo;

impl SessionRepo {
    /// Insert a session with a caller-chosen id and token hash.
    ///
    /// A hash collision surfaces as `Conflict`; the caller retries with a
    /// fresh session id and token.
    ///
    /// # Errors
    /// Returns an error if the insert fails for any other reason.
    pub async fn create(
        pool: &PgPool,
        session_id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
        device_info: Option<&str>,
        ip_address: Option<&str>,
        ttl_days: i64,
    ) -> Result<CreateSessionOutcome> {
        let expires_at = Utc::now() + Duration::days(ttl_days);
        let query = r"
            INSERT INTO sessions
                (id, user_id, refresh_token_hash, device_info, ip_address, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query_as::<_, Session>(query)
            .bind(session_id)
            .bind(user_id)
            .bind(refresh_token_hash)
            .bind(device_info)
            .bind(ip_address)
            .bind(expires_at)
            .fetch_one(pool)
            .instrument(span)
            .await;

        match inserted {
            Ok(session) => Ok(CreateSessionOutcome::Created(session)),
            Err(err) if is_unique_violation(&err) => Ok(CreateSessionOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert session"),
        }
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(pool: &PgPool, session_id: Uuid) -> Result<Option<Session>> {
        let query = "SELECT * FROM sessions WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, Session>(query)
            .bind(session_id)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup session")
    }

    /// Validate a presented refresh token against the stored grant: fetch by
    /// id, recompute the hash, compare without short-circuiting, then check
    /// revocation and expiry.
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    pub async fn validate(
        pool: &PgPool,
        session_id: Uuid,
        refresh_token_raw: &str,
    ) -> Result<SessionValidation> {
        let Some(session) = Self::find_by_id(pool, session_id).await? else {
            return Ok(SessionValidation::Invalid);
        };

        let presented = hash_token(refresh_token_raw);
        if !constant_time_eq(&presented, &session.refresh_token_hash) {
            return Ok(SessionValidation::Invalid);
        }
        if !session.is_active_at(Utc::now()) {
            return Ok(SessionValidation::Invalid);
        }
        Ok(SessionValidation::Valid(session))
    }

    /// Revoke one session. Idempotent: an already revoked session keeps its
    /// original reason and timestamp.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn revoke(pool: &PgPool, session_id: Uuid, reason: RevokeReason) -> Result<()> {
        let query = r"
            UPDATE sessions
            SET revoked = TRUE, revoked_at = NOW(), revoked_reason = $2
            WHERE id = $1 AND revoked = FALSE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .bind(reason.as_str())
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to revoke session")?;
        Ok(())
    }

    /// Revoke every live session for a user, returning how many were hit.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn revoke_all(pool: &PgPool, user_id: Uuid, reason: RevokeReason) -> Result<u64> {
        let query = r"
            UPDATE sessions
            SET revoked = TRUE, revoked_at = NOW(), revoked_reason = $2
            WHERE user_id = $1 AND revoked = FALSE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(reason.as_str())
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to revoke sessions")?;
        Ok(result.rows_affected())
    }

    /// Record a validated use of the session.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn touch(pool: &PgPool, session_id: Uuid) -> Result<()> {
        let query = "UPDATE sessions SET last_used_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to touch session")?;
        Ok(())
    }

    /// Swap in a new refresh-token hash on rotation. The expiry window is
    /// extended to match the newly minted token so the row never outlives
    /// or undercuts its secret.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn rotate_refresh_hash(
        pool: &PgPool,
        session_id: Uuid,
        new_hash: &str,
        ttl_days: i64,
    ) -> Result<()> {
        let expires_at = Utc::now() + Duration::days(ttl_days);
        let query = r"
            UPDATE sessions
            SET refresh_token_hash = $2, expires_at = $3, last_used_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .bind(new_hash)
            .bind(expires_at)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to rotate refresh token hash")?;
        Ok(())
    }

    /// Live sessions for a user, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_active_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Session>> {
        let query = r"
            SELECT * FROM sessions
            WHERE user_id = $1 AND revoked = FALSE AND expires_at > NOW()
            ORDER BY created_at DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, Session>(query)
            .bind(user_id)
            .fetch_all(pool)
            .instrument(span)
            .await
            .context("failed to list sessions")
    }

    /// Check whether the user has any prior sessions and whether this exact
    /// device string has been seen before. Drives the new-device alert.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn device_history(
        pool: &PgPool,
        user_id: Uuid,
        device_info: Option<&str>,
    ) -> Result<DeviceHistory> {
        let query = r"
            SELECT
                EXISTS(SELECT 1 FROM sessions WHERE user_id = $1) AS has_sessions,
                EXISTS(
                    SELECT 1 FROM sessions
                    WHERE user_id = $1 AND device_info IS NOT DISTINCT FROM $2
                ) AS device_seen
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(device_info)
            .fetch_one(pool)
            .instrument(span)
            .await
            .context("failed to check device history")?;

        Ok(DeviceHistory {
            has_sessions: row.get("has_sessions"),
            device_seen: row.get("device_seen"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_debug_names() {
        assert_eq!(format!("{:?}", CreateSessionOutcome::Conflict), "Conflict");
        assert_eq!(format!("{:?}", SessionValidation::Invalid), "Invalid");
    }

    #[test]
    fn presented_token_must_match_stored_hash() {
        let stored = hash_token("raw-refresh-token");
        assert!(constant_time_eq(&hash_token("raw-refresh-token"), &stored));
        assert!(!constant_time_eq(&hash_token("other-token"), &stored));
    }
}
