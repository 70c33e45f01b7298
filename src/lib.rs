//! # SyncVeil (Session & Token Authentication Backend)
//!
//! `syncveil` is an email/password authentication service. It issues short-lived
//! **JWT access tokens** paired with opaque, rotating **refresh tokens**, and keeps
//! one server-side session row per device so sessions can be listed and revoked
//! individually.
//!
//! ## Accounts & Verification
//!
//! Registration is email + password (Argon2id at rest). New accounts receive a
//! single-use verification token by email; until it is redeemed, login is refused
//! unless the verification gate is disabled. Lookups never reveal whether an email
//! is registered: failed logins and duplicate registrations answer with the same
//! generic error.
//!
//! ## Sessions & Tokens
//!
//! - **Access tokens** are `HS256` JWTs carrying the session id, verified offline.
//! - **Refresh tokens** are stored only as `SHA-256` hashes. With rotation
//!   enabled every refresh swaps the secret in place; a stale token no longer
//!   matches the ledger and is refused.
//! - **Soft deletes:** users are disabled, sessions are revoked. Nothing is removed
//!   from either table, so audit trails stay intact.
//!
//! ## Login OTP
//!
//! When enabled, password login answers with an OTP challenge instead of tokens.
//! Codes are numeric, hashed at rest, single-use and attempt-limited.
//!
//! ## Audit
//!
//! `login_logs` and `admin_actions` are append-only. Audit rows outlive the users
//! they reference; the user id is nulled on account removal instead of cascading.

pub mod admin;
pub mod api;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod email;
pub mod otp;
pub mod session;
pub mod token;
pub mod users;
mod utils;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result, ensure};
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    // Normalize SQL to avoid brittle formatting checks in schema tests.
    fn canonicalize_sql(sql: &str) -> String {
        sql.chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect()
    }

    fn canonical_schema() -> Result<(PathBuf, String)> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("db/sql/schema.sql");
        let sql = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read SQL file at {}", path.display()))?;
        let canonical = canonicalize_sql(&sql);
        Ok((path, canonical))
    }

    fn assert_contains(path: &Path, canonical: &str, needle: &str) -> Result<()> {
        ensure!(
            canonical.contains(needle),
            "Expected {needle} is missing in {}",
            path.display()
        );
        Ok(())
    }

    #[test]
    fn schema_enforces_unique_credentials() -> Result<()> {
        let (path, canonical) = canonical_schema()?;
        // canonicalize_sql strips whitespace/lowercases, so the snippets are compact.
        assert_contains(&path, &canonical, "emailvarchar(255)notnullunique")?;
        assert_contains(
            &path,
            &canonical,
            "refresh_token_hashvarchar(255)notnullunique",
        )?;
        assert_contains(&path, &canonical, "tokenvarchar(255)notnullunique")
    }

    #[test]
    fn schema_soft_delete_defaults() -> Result<()> {
        let (path, canonical) = canonical_schema()?;
        assert_contains(&path, &canonical, "disabledbooleannotnulldefaultfalse")?;
        assert_contains(&path, &canonical, "revokedbooleannotnulldefaultfalse")?;
        assert_contains(&path, &canonical, "attemptsintegernotnulldefault0")
    }

    #[test]
    fn schema_keeps_audit_rows_on_user_delete() -> Result<()> {
        let (path, canonical) = canonical_schema()?;
        assert_contains(
            &path,
            &canonical,
            "user_iduuidreferencesusers(id)ondeletesetnull",
        )?;
        assert_contains(
            &path,
            &canonical,
            "target_user_iduuidreferencesusers(id)ondeletesetnull",
        )
    }
}
