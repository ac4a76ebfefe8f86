//! Password hashing service
//!
//! Argon2id with a per-hash random salt. Hashing is CPU-bound, so the
//! async entry points push the work onto the blocking pool instead of
//! stalling a request-handling worker.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::error::{ApiError, ApiResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a fresh random salt.
///
/// The same input yields a different digest on every call. A work factor
/// that blows the latency budget is a configuration error, not something
/// this function can recover from at runtime.
pub fn hash_password_sync(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Compare a plaintext against a stored digest.
///
/// Never errors: a malformed digest compares false. The underlying
/// verification is resistant to timing side channels.
pub fn verify_password_sync(password: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Async wrapper around [`hash_password_sync`] on the blocking pool.
pub async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

/// Async wrapper around [`verify_password_sync`] on the blocking pool.
pub async fn verify_password(password: String, digest: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password_sync(&password, &digest))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}

/// Minimal strength gate applied to sign-up and reset payloads.
pub fn validate_password_strength(password: &str) -> ApiResult<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
