//! Argon2id password hashing.
//!
//! Hash strings are PHC encoded, so verification reads its parameters from the
//! stored hash and stays valid across parameter changes.

use anyhow::{Result, anyhow};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Cost parameters supplied by the auth configuration.
#[derive(Debug, Clone, Copy)]
pub struct PasswordParams {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password with a fresh random salt.
///
/// # Errors
/// Returns an error if the parameters are rejected or hashing fails.
pub fn hash_password(password: &str, params: PasswordParams) -> Result<String> {
    let params = Params::new(
        params.memory_kib,
        params.time_cost,
        params.parallelism,
        None,
    )
    .map_err(|err| anyhow!("invalid argon2 parameters: {err}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash string.
///
/// Malformed stored hashes count as a mismatch rather than an error so a
/// corrupt row cannot be told apart from a wrong password by the caller.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
