//! Refresh-token rotation store
//!
//! Tracks the single valid refresh-token identifier per user. Inserting a
//! new identifier unconditionally supersedes the previous one, so there
//! is at most one active refresh session per user at any time. Backed by
//! Redis so any service instance can serve the refresh request; insert
//! and invalidate are last-writer-wins, no cross-instance locking.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Upper bound on any store round trip. Hitting it surfaces as
/// Unauthorized upstream rather than hanging the request.
const STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Record `token_id` as the only valid identifier for `user_id`,
    /// superseding whatever was there before.
    async fn insert(&self, user_id: Uuid, token_id: Uuid) -> ApiResult<()>;

    /// Check the presented identifier against the stored one. Absent and
    /// superseded identifiers are indistinguishable: both fail with
    /// [`ApiError::InvalidatedRefreshToken`].
    async fn validate(&self, user_id: Uuid, token_id: Uuid) -> ApiResult<()>;

    /// Drop the record, after a refresh token is consumed or on logout.
    async fn invalidate(&self, user_id: Uuid) -> ApiResult<()>;
}

#[derive(Clone)]
pub struct RedisRefreshTokenStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisRefreshTokenStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(user_id: Uuid) -> String {
        format!("refresh-token:{user_id}")
    }
}

#[async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn insert(&self, user_id: Uuid, token_id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.clone();
        let write = conn.set::<_, _, ()>(Self::key(user_id), token_id.to_string());
        tokio::time::timeout(STORE_TIMEOUT, write)
            .await
            .map_err(|_| ApiError::Unauthorized)?
            .map_err(|e| ApiError::Internal(format!("refresh store write failed: {e}")))
    }

    async fn validate(&self, user_id: Uuid, token_id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.clone();
        let read = conn.get::<_, Option<String>>(Self::key(user_id));
        let stored = tokio::time::timeout(STORE_TIMEOUT, read)
            .await
            .map_err(|_| ApiError::Unauthorized)?
            .map_err(|e| ApiError::Internal(format!("refresh store read failed: {e}")))?;

        match stored {
            Some(id) if id == token_id.to_string() => Ok(()),
            _ => Err(ApiError::InvalidatedRefreshToken),
        }
    }

    async fn invalidate(&self, user_id: Uuid) -> ApiResult<()> {
        let mut conn = self.conn.clone();
        let del = conn.del::<_, ()>(Self::key(user_id));
        tokio::time::timeout(STORE_TIMEOUT, del)
            .await
            .map_err(|_| ApiError::Unauthorized)?
            .map_err(|e| ApiError::Internal(format!("refresh store delete failed: {e}")))
    }
}
