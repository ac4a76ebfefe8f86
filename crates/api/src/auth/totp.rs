//! TOTP service for two-factor authentication
//!
//! Secrets are generated fresh per enrollment and handed back as a base32
//! string plus an otpauth provisioning URI the caller can render into a
//! scannable code. Verification allows one 30-second step of clock drift
//! in either direction.
//!
//! The shared secret is stored in recoverable form: verification has to
//! re-derive the code from the original secret, so hashing it is not an
//! option. This is a documented trade-off, not an oversight; with a KMS
//! available the secret should be envelope-encrypted at rest.

use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::db::UserStore;
use crate::error::{ApiError, ApiResult};

pub const TOTP_DIGITS: usize = 6;
pub const TOTP_STEP: u64 = 30;
pub const TOTP_SKEW: u8 = 1;

/// Output of a 2FA enrollment: the shared secret and the URI to render.
#[derive(Debug, Clone)]
pub struct GeneratedSecret {
    pub secret: String,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct TotpService {
    app_name: String,
}

impl TotpService {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
        }
    }

    /// Generate a fresh base32 secret (160 bits) and a provisioning URI
    /// labelled with the account and the configured issuer.
    pub fn generate_secret(&self, account: &str) -> ApiResult<GeneratedSecret> {
        let Secret::Encoded(secret) = Secret::generate_secret().to_encoded() else {
            return Err(ApiError::Internal("TOTP secret encoding failed".into()));
        };
        let totp = self.build(&secret, account)?;
        Ok(GeneratedSecret {
            uri: totp.get_url(),
            secret,
        })
    }

    /// Verify a 6-digit code against the current time step (±1 step).
    /// Anything that is not exactly six ASCII digits is rejected outright.
    pub fn verify_code(&self, code: &str, secret: &str) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.verify_code_at(code, secret, now)
    }

    /// Verify a code against an explicit unix timestamp. Exposed so tests
    /// can pin the clock instead of racing a step boundary.
    pub fn verify_code_at(&self, code: &str, secret: &str, at: u64) -> bool {
        if code.len() != TOTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match self.build(secret, "account") {
            Ok(totp) => totp.check(code, at),
            Err(_) => false,
        }
    }

    /// Persist the secret and flip the enabled flag; subsequent sign-ins
    /// for this user will require a valid code.
    pub async fn enable_tfa_for_user(
        &self,
        users: &dyn UserStore,
        user_id: Uuid,
        secret: &str,
    ) -> ApiResult<()> {
        users.set_two_factor(user_id, secret).await?;
        tracing::info!(user_id = %user_id, "Two-factor authentication enabled");
        Ok(())
    }

    fn build(&self, secret: &str, account: &str) -> ApiResult<TOTP> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|_| ApiError::Internal("invalid TOTP secret".into()))?;
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            bytes,
            Some(self.app_name.clone()),
            account.to_string(),
        )
        .map_err(|e| ApiError::Internal(format!("TOTP construction failed: {e}")))
    }
}
