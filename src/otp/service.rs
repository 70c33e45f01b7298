use crate::{
    otp::{
        models::{OtpChallenge, OtpPurpose},
        repo::OtpRepo,
    },
    utils::{constant_time_eq, generate_otp_code, hash_token},
};
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Result of checking a submitted code against a challenge.
///
/// Every variant except `Verified` leaves the caller with nothing: the
/// challenge id is never echoed back so a failed submission cannot be used
/// to enumerate live challenges.
#[derive(Debug)]
pub enum OtpVerifyOutcome {
    Verified(OtpChallenge),
    NotFound,
    AlreadyUsed,
    Expired,
    AttemptsExceeded,
    Mismatch,
}

#[derive(Clone)]
pub struct OtpService {
    pool: PgPool,
    code_length: usize,
    ttl_minutes: i64,
    max_attempts: i32,
}

impl OtpService {
    #[must_use]
    pub fn new(pool: PgPool, code_length: usize, ttl_minutes: i64, max_attempts: i32) -> Self {
        Self {
            pool,
            code_length,
            ttl_minutes,
            max_attempts,
        }
    }

    /// Issues a fresh challenge for the user and returns it together with the
    /// plaintext code. The code is only available here; the store keeps a hash.
    ///
    /// Issuing never touches earlier challenges. Stale rows simply stop being
    /// the newest one and age out through their expiry.
    ///
    /// # Errors
    /// Returns an error if code generation or the database insert fails.
    pub async fn issue(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        ip_address: Option<&str>,
        device_info: Option<&str>,
    ) -> Result<(OtpChallenge, String)> {
        // 1. Generate the code and store only its hash
        let code = generate_otp_code(self.code_length)?;
        let otp_hash = hash_token(&code);

        // 2. Persist the challenge
        let challenge = OtpRepo::insert(
            &self.pool,
            user_id,
            &otp_hash,
            purpose,
            self.ttl_minutes,
            ip_address,
            device_info,
        )
        .await?;

        Ok((challenge, code))
    }

    /// Verifies a code against one specific challenge.
    ///
    /// Terminal states are checked before the attempt counter moves, so a
    /// submission against an expired or already-used challenge reports that
    /// state without burning an attempt.
    ///
    /// # Errors
    /// Returns an error if a database query fails.
    pub async fn verify_challenge(
        &self,
        challenge_id: Uuid,
        code: &str,
    ) -> Result<OtpVerifyOutcome> {
        // 1. Fetch and classify terminal states first
        let Some(challenge) = OtpRepo::find(&self.pool, challenge_id).await? else {
            return Ok(OtpVerifyOutcome::NotFound);
        };

        if challenge.verified {
            return Ok(OtpVerifyOutcome::AlreadyUsed);
        }

        if challenge.is_expired_at(Utc::now()) {
            return Ok(OtpVerifyOutcome::Expired);
        }

        if challenge.attempts >= self.max_attempts {
            return Ok(OtpVerifyOutcome::AttemptsExceeded);
        }

        // 2. Claim an attempt; the row-level guards settle races with
        //    concurrent submissions against the same challenge
        let Some(claimed) =
            OtpRepo::claim_attempt(&self.pool, challenge_id, self.max_attempts).await?
        else {
            return Ok(self.classify_unclaimable(challenge_id).await?);
        };

        // 3. Compare hashes without short-circuiting on the first byte
        if !constant_time_eq(&hash_token(code), &claimed.otp_hash) {
            return Ok(OtpVerifyOutcome::Mismatch);
        }

        // 4. Mark verified; the challenge is now spent for good
        OtpRepo::mark_verified(&self.pool, challenge_id).await?;

        let verified = OtpRepo::find(&self.pool, challenge_id)
            .await?
            .unwrap_or(challenge);

        Ok(OtpVerifyOutcome::Verified(verified))
    }

    /// Re-reads a challenge whose attempt claim failed to report why. A
    /// concurrent submission may have spent it or exhausted its attempts
    /// between the first read and the claim.
    async fn classify_unclaimable(&self, challenge_id: Uuid) -> Result<OtpVerifyOutcome> {
        let Some(challenge) = OtpRepo::find(&self.pool, challenge_id).await? else {
            return Ok(OtpVerifyOutcome::NotFound);
        };

        if challenge.verified {
            return Ok(OtpVerifyOutcome::AlreadyUsed);
        }

        if challenge.is_expired_at(Utc::now()) {
            return Ok(OtpVerifyOutcome::Expired);
        }

        Ok(OtpVerifyOutcome::AttemptsExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_debug_names() {
        assert_eq!(format!("{:?}", OtpVerifyOutcome::NotFound), "NotFound");
        assert_eq!(
            format!("{:?}", OtpVerifyOutcome::AlreadyUsed),
            "AlreadyUsed"
        );
        assert_eq!(format!("{:?}", OtpVerifyOutcome::Expired), "Expired");
        assert_eq!(
            format!("{:?}", OtpVerifyOutcome::AttemptsExceeded),
            "AttemptsExceeded"
        );
        assert_eq!(format!("{:?}", OtpVerifyOutcome::Mismatch), "Mismatch");
    }

    #[test]
    fn service_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<OtpService>();
    }
}
