//! Authentication service
//!
//! Orchestrates sign-up, sign-in (with optional 2FA), token issuance and
//! rotation, and the password-reset lifecycle. Collaborators are plain
//! struct fields wired up explicitly at startup; persistence is reached
//! only through the `db` traits.
//!
//! A sign-in attempt moves through credential check, then the two-factor
//! check when the account has it enabled, then token issuance. Every
//! failure on that path is the same generic `BadCredentials` so a caller
//! can never learn which step rejected them.

use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::db::{
    ApiKeyStore, NewUser, PasswordReset, PasswordResetStore, User, UserStore,
};
use crate::email::MailService;
use crate::error::{ApiError, ApiResult};

use super::api_key::{ApiKeyManager, GeneratedApiKey};
use super::jwt::JwtSigner;
use super::password;
use super::refresh_store::RefreshTokenStore;
use super::totp::{GeneratedSecret, TotpService};

/// Length of a password-reset token (alphanumeric characters).
const RESET_TOKEN_LEN: usize = 43;

/// Time source, injectable so expiry logic is deterministic under test.
pub type Clock = fn() -> OffsetDateTime;

/// The access/refresh pair handed to callers. Transient, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpPayload {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInPayload {
    pub email: String,
    pub password: String,
    pub tfa_code: Option<String>,
}

pub struct AuthService {
    pub users: Arc<dyn UserStore>,
    pub resets: Arc<dyn PasswordResetStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub api_key_store: Arc<dyn ApiKeyStore>,
    pub api_keys: ApiKeyManager,
    pub jwt: JwtSigner,
    pub totp: TotpService,
    pub mail: MailService,
    pub clock: Clock,
    pub reset_token_ttl: Duration,
}

impl AuthService {
    /// Validate an email/password pair.
    ///
    /// Query-style: absent user and wrong password both come back as
    /// `None`, not as errors. The stored hash is consumed here and never
    /// attached to the returned user.
    pub async fn check_credentials(&self, email: &str, pw: &str) -> ApiResult<Option<User>> {
        let Some(found) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };
        // Social-only accounts have no password credential to check.
        let Some(hash) = found.password_hash else {
            return Ok(None);
        };
        if password::verify_password(pw.to_string(), hash).await? {
            Ok(Some(found.user))
        } else {
            Ok(None)
        }
    }

    pub async fn sign_in(&self, payload: SignInPayload) -> ApiResult<TokenPair> {
        let user = self
            .check_credentials(&payload.email, &payload.password)
            .await?
            .ok_or(ApiError::BadCredentials)?;

        if user.two_factor_enabled {
            let secret = user
                .two_factor_secret
                .as_deref()
                .ok_or(ApiError::BadCredentials)?;
            let code = payload.tfa_code.as_deref().unwrap_or_default();
            if !self.totp.verify_code(code, secret) {
                // Same error as a bad password: 2FA failures must not be
                // distinguishable from credential failures.
                tracing::warn!(user_id = %user.id, "Sign-in rejected: invalid 2FA code");
                return Err(ApiError::BadCredentials);
            }
        }

        self.users.touch_last_sign_in(user.id).await?;
        tracing::info!(user_id = %user.id, "Sign-in successful");
        self.generate_tokens(&user).await
    }

    pub async fn sign_up(&self, payload: SignUpPayload) -> ApiResult<TokenPair> {
        password::validate_password_strength(&payload.password)?;
        let password_hash = password::hash_password(payload.password).await?;

        // No existence pre-check: the unique constraint decides, which
        // closes the race between check and insert. The store surfaces a
        // violation as Conflict.
        let user = self
            .users
            .create(NewUser {
                email: payload.email,
                username: payload.username,
                first_name: payload.first_name,
                last_name: payload.last_name,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        self.generate_tokens(&user).await
    }

    /// Issue a fresh access/refresh pair for a user.
    ///
    /// The two tokens are signed concurrently; the rotation identifier is
    /// recorded only after both signings succeed, so the store never
    /// holds an id for a token that was not issued. Recording the new id
    /// supersedes the previous one: signing in from a new device
    /// invalidates the prior refresh token by design.
    pub async fn generate_tokens(&self, user: &User) -> ApiResult<TokenPair> {
        let refresh_token_id = Uuid::new_v4();

        let (access_token, refresh_token) = tokio::try_join!(
            async { self.jwt.sign_access_token(user.id, &user.email) },
            async { self.jwt.sign_refresh_token(user.id, refresh_token_id) },
        )?;

        self.refresh_tokens.insert(user.id, refresh_token_id).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Rotate a refresh token: verify, validate the stored id, invalidate
    /// it, and issue a new pair. Every failure in this chain collapses to
    /// the same opaque Unauthorized.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        self.rotate(refresh_token).await.map_err(|e| {
            tracing::warn!(error = %e, "Refresh token rejected");
            ApiError::Unauthorized
        })
    }

    async fn rotate(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;
        let token_id = claims.refresh_token_id.ok_or(ApiError::Unauthorized)?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        self.refresh_tokens.validate(user.id, token_id).await?;
        self.refresh_tokens.invalidate(user.id).await?;

        self.generate_tokens(&user).await
    }

    /// Start the reset flow. Unlike sign-in this endpoint is explicitly
    /// about account existence, so an unknown email gets a specific
    /// message. The token is handed to the mail sender and also returned
    /// for out-of-band delivery.
    pub async fn forgot_password(&self, email: &str) -> ApiResult<String> {
        let found = self.users.find_by_email(email).await?.ok_or_else(|| {
            ApiError::BadRequest("We can't find a user with that e-mail address".to_string())
        })?;

        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LEN)
            .map(char::from)
            .collect();

        self.resets
            .create(PasswordReset {
                token: token.clone(),
                email: found.user.email.clone(),
                expires_at: (self.clock)() + self.reset_token_ttl,
            })
            .await?;

        tracing::info!(user_id = %found.user.id, "Password reset requested");
        self.mail.send_password_reset(&found.user.email, &token);

        Ok(token)
    }

    /// Consume a reset token: replace the credential wholesale and delete
    /// the request, both-or-neither. A token is usable at most once and
    /// only while `now < expires_at`.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> ApiResult<()> {
        password::validate_password_strength(new_password)?;

        let reset = self.resets.find_by_token(token).await?.ok_or_else(|| {
            ApiError::BadRequest("Invalid password reset token.".to_string())
        })?;

        if reset.expires_at < (self.clock)() {
            // Expired requests are dropped on first touch so they can
            // never be retried into a success.
            self.resets.delete(token).await?;
            return Err(ApiError::BadRequest(
                "Password reset token has expired.".to_string(),
            ));
        }

        let password_hash = password::hash_password(new_password.to_string()).await?;
        self.users
            .replace_password(&reset.email, &password_hash, token)
            .await?;

        tracing::info!(email = %reset.email, "Password reset completed");
        Ok(())
    }

    /// Enroll a user in two-factor auth: fresh secret, persisted and
    /// enabled, provisioning URI returned for the caller to render.
    pub async fn enable_two_factor(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> ApiResult<GeneratedSecret> {
        let generated = self.totp.generate_secret(email)?;
        self.totp
            .enable_tfa_for_user(self.users.as_ref(), user_id, &generated.secret)
            .await?;
        Ok(generated)
    }

    /// Issue an API key for a user. The composite key is returned exactly
    /// once; only the opaque id and secret hash are stored.
    pub async fn issue_api_key(&self, user_id: Uuid) -> ApiResult<GeneratedApiKey> {
        let key = self.api_keys.generate_key()?;
        self.api_key_store
            .create(key.id, &key.secret_hash, user_id)
            .await?;
        tracing::info!(user_id = %user_id, key_id = %key.id, "API key issued");
        Ok(key)
    }
}
