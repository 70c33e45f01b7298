//! Database access for user accounts and email verification tokens.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use crate::users::models::{EmailVerification, User};
use crate::utils::is_unique_violation;

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created {
        user: User,
        verification: Option<EmailVerification>,
    },
    Conflict,
}

/// A verification token to persist alongside a new user row.
#[derive(Debug, Clone, Copy)]
pub struct PendingVerification<'a> {
    pub token: &'a str,
    pub ttl_hours: i64,
}

pub struct UserRepo;

impl UserRepo {
    /// Create a user and, when requested, its email verification row in one
    /// transaction. The unique email constraint decides registration races.
    ///
    /// # Errors
    /// Returns an error if the transaction fails for any reason other than a
    /// duplicate email.
    pub async fn create(
        pool: &PgPool,
        email: &str,
        password_hash: &str,
        pre_verified: bool,
        verification: Option<PendingVerification<'_>>,
    ) -> Result<CreateUserOutcome> {
        let mut tx = pool.begin().await.context("begin register transaction")?;

        let query = r"
            INSERT INTO users (id, email, password_hash, email_verified, email_verified_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 THEN NOW() END)
            RETURNING *
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query_as::<_, User>(query)
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(password_hash)
            .bind(pre_verified)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let user = match inserted {
            Ok(user) => user,
            Err(err) => {
                if is_unique_violation(&err) {
                    let _ = tx.rollback().await;
                    return Ok(CreateUserOutcome::Conflict);
                }
                return Err(err).context("failed to insert user");
            }
        };

        let verification = match verification {
            Some(pending) => {
                let expires_at = Utc::now() + Duration::hours(pending.ttl_hours);
                let query = r"
                    INSERT INTO email_verifications (id, user_id, token, expires_at)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "INSERT",
                    db.statement = query
                );
                let row = sqlx::query_as::<_, EmailVerification>(query)
                    .bind(Uuid::new_v4())
                    .bind(user.id)
                    .bind(pending.token)
                    .bind(expires_at)
                    .fetch_one(&mut *tx)
                    .instrument(span)
                    .await
                    .context("failed to insert verification token")?;
                Some(row)
            }
            None => None,
        };

        tx.commit().await.context("commit register transaction")?;

        Ok(CreateUserOutcome::Created { user, verification })
    }

    /// Case handling happens in the caller; emails are stored normalized.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
        let query = "SELECT * FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, User>(query)
            .bind(email)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
        let query = "SELECT * FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, User>(query)
            .bind(id)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")
    }

    /// Soft-disable a user. Existing sessions are untouched; revoking them is
    /// a separate, explicit step.
    ///
    /// Returns `false` when no such user exists. Disabling an already
    /// disabled user keeps the original reason and timestamp.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn disable(pool: &PgPool, user_id: Uuid, reason: &str) -> Result<bool> {
        let query = r"
            UPDATE users
            SET disabled = TRUE,
                disabled_at = NOW(),
                disabled_reason = $2,
                updated_at = NOW()
            WHERE id = $1 AND disabled = FALSE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let updated = sqlx::query(query)
            .bind(user_id)
            .bind(reason)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to disable user")?;

        if updated.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(Self::find_by_id(pool, user_id).await?.is_some())
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn touch_last_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
        let query = "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to touch last_login_at")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_verification_by_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<EmailVerification>> {
        let query = "SELECT * FROM email_verifications WHERE token = $1 AND verified = FALSE";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, EmailVerification>(query)
            .bind(token)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup verification token")
    }

    /// Remove a verification row, used when expiry is detected on lookup.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_verification(pool: &PgPool, verification_id: Uuid) -> Result<()> {
        let query = "DELETE FROM email_verifications WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(verification_id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to delete verification token")?;
        Ok(())
    }

    /// Mark the user verified and consume the token in one transaction so a
    /// replayed token can never verify twice.
    ///
    /// Returns the updated user, or `None` if the owning user vanished.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn consume_verification(
        pool: &PgPool,
        verification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<User>> {
        let mut tx = pool
            .begin()
            .await
            .context("begin verify-email transaction")?;

        let query = r"
            UPDATE users
            SET email_verified = TRUE,
                email_verified_at = COALESCE(email_verified_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let user = sqlx::query_as::<_, User>(query)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to mark user verified")?;

        if user.is_none() {
            let _ = tx.rollback().await;
            return Ok(None);
        }

        let query = "DELETE FROM email_verifications WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(verification_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to consume verification token")?;

        tx.commit().await.context("commit verify-email transaction")?;

        Ok(user)
    }
}

/// True once a verification row is past its expiry.
#[must_use]
pub fn verification_expired(verification: &EmailVerification, now: DateTime<Utc>) -> bool {
    verification.expires_at <= now
}
