//! Persistence interfaces and models
//!
//! The core talks to storage through these traits so the authentication
//! service can be exercised against in-memory doubles. Production
//! implementations are sqlx/Postgres, in `users`, `password_resets`, and
//! `api_keys`.

pub mod api_keys;
pub mod password_resets;
#[cfg(test)]
pub(crate) mod testing;
pub mod users;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

pub use api_keys::PgApiKeyStore;
pub use password_resets::PgPasswordResetStore;
pub use users::PgUserStore;

/// Identity record. The password hash is deliberately not a field here;
/// it only travels alongside the user in [`UserWithCredential`] on the
/// credential-check path and is stripped before the user object goes
/// anywhere else.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub google_id: Option<String>,
    pub two_factor_secret: Option<String>,
    pub two_factor_enabled: bool,
    pub last_sign_in_at: Option<OffsetDateTime>,
}

/// User joined with their password credential, for credential checks only.
#[derive(Debug, Clone)]
pub struct UserWithCredential {
    pub user: User,
    /// None for social-only accounts that never set a password.
    pub password_hash: Option<String>,
}

/// Fields for a password sign-up.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: String,
}

/// A pending password-reset request.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub token: String,
    pub email: String,
    pub expires_at: OffsetDateTime,
}

/// API key row joined with its owner, as needed by the ApiKey strategy.
#[derive(Debug, Clone)]
pub struct ApiKeyOwner {
    pub key_hash: String,
    pub user_id: Uuid,
    pub email: String,
}

/// User persistence. Lookups return `None` for absent (or soft-deleted)
/// rows; `Err` is reserved for true faults. Duplicate registrations
/// surface as [`crate::error::ApiError::Conflict`] out of `create` /
/// `create_google_user` so callers never pre-check-then-insert.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-normalized email lookup with the credential joined.
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<UserWithCredential>>;
    async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>>;
    async fn find_by_google_id(&self, google_id: &str) -> ApiResult<Option<User>>;
    /// Creates the user and their credential atomically (both-or-neither).
    async fn create(&self, user: NewUser) -> ApiResult<User>;
    /// Creates a passwordless user bound to an external Google subject.
    async fn create_google_user(&self, email: &str, google_id: &str) -> ApiResult<User>;
    /// Replaces the credential wholesale and deletes the consumed reset
    /// request in one transaction.
    async fn replace_password(&self, email: &str, password_hash: &str, reset_token: &str)
        -> ApiResult<()>;
    async fn set_two_factor(&self, user_id: Uuid, secret: &str) -> ApiResult<()>;
    async fn touch_last_sign_in(&self, user_id: Uuid) -> ApiResult<()>;
}

#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    async fn create(&self, reset: PasswordReset) -> ApiResult<()>;
    async fn find_by_token(&self, token: &str) -> ApiResult<Option<PasswordReset>>;
    async fn delete(&self, token: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Opaque-id lookup with the owning user joined.
    async fn find_by_opaque_id(&self, id: Uuid) -> ApiResult<Option<ApiKeyOwner>>;
    async fn create(&self, id: Uuid, key_hash: &str, user_id: Uuid) -> ApiResult<()>;
}
