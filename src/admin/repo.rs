use crate::admin::models::AdminUser;
use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub struct AdminRepo;

impl AdminRepo {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>(
            r"
            SELECT id, email, password_hash, role, disabled, created_at, last_login_at
            FROM admin_users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch admin user")?;

        Ok(admin)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(pool: &PgPool, admin_id: Uuid) -> Result<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>(
            r"
            SELECT id, email, password_hash, role, disabled, created_at, last_login_at
            FROM admin_users
            WHERE id = $1
            ",
        )
        .bind(admin_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch admin user")?;

        Ok(admin)
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn touch_last_login(pool: &PgPool, admin_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1")
            .bind(admin_id)
            .execute(pool)
            .await
            .context("Failed to update admin last login")?;

        Ok(())
    }
}
