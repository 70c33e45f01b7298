use crate::audit::models::{FailureReason, LoginLog};
use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

/// One login attempt about to be recorded.
pub struct LoginAttempt<'a> {
    pub email: &'a str,
    pub user_id: Option<Uuid>,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub ip_address: &'a str,
    pub device_info: Option<&'a str>,
}

pub struct AuditRepo;

impl AuditRepo {
    /// Appends a login attempt. Never propagates failure: a broken audit
    /// insert is logged here and the login flow continues.
    pub async fn record_login(pool: &PgPool, attempt: LoginAttempt<'_>) {
        if let Err(err) = Self::try_record_login(pool, &attempt).await {
            error!(
                "Failed to record login attempt for {}: {err:#}",
                attempt.email
            );
        }
    }

    async fn try_record_login(pool: &PgPool, attempt: &LoginAttempt<'_>) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO login_logs (email, user_id, success, failure_reason, ip_address, device_info)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(attempt.email)
        .bind(attempt.user_id)
        .bind(attempt.success)
        .bind(attempt.failure_reason.map(|reason| reason.as_str()))
        .bind(attempt.ip_address)
        .bind(attempt.device_info)
        .execute(pool)
        .await
        .context("Failed to insert login log")?;

        Ok(())
    }

    /// Appends an admin action. Same failure isolation as `record_login`.
    pub async fn record_admin_action(
        pool: &PgPool,
        admin_id: Uuid,
        action_type: &str,
        target_user_id: Option<Uuid>,
        details: Option<&str>,
        ip_address: &str,
    ) {
        let result = sqlx::query(
            r"
            INSERT INTO admin_actions (admin_id, action_type, target_user_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(admin_id)
        .bind(action_type)
        .bind(target_user_id)
        .bind(details)
        .bind(ip_address)
        .execute(pool)
        .await;

        if let Err(err) = result {
            error!("Failed to record admin action {action_type}: {err:#}");
        }
    }

    /// Most recent login attempts for one user, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_login_logs_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LoginLog>> {
        let logs = sqlx::query_as::<_, LoginLog>(
            r"
            SELECT id, user_id, email, success, failure_reason, ip_address, device_info, timestamp
            FROM login_logs
            WHERE user_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch login logs")?;

        Ok(logs)
    }
}
