//! Postgres-backed password-reset persistence

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::ApiResult;

use super::{PasswordReset, PasswordResetStore};

#[derive(Debug, FromRow)]
struct PasswordResetRow {
    token: String,
    email: String,
    expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct PgPasswordResetStore {
    pool: PgPool,
}

impl PgPasswordResetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetStore for PgPasswordResetStore {
    async fn create(&self, reset: PasswordReset) -> ApiResult<()> {
        sqlx::query("INSERT INTO password_resets (token, email, expires_at) VALUES ($1, $2, $3)")
            .bind(&reset.token)
            .bind(&reset.email)
            .bind(reset.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> ApiResult<Option<PasswordReset>> {
        let row: Option<PasswordResetRow> =
            sqlx::query_as("SELECT token, email, expires_at FROM password_resets WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| PasswordReset {
            token: r.token,
            email: r.email,
            expires_at: r.expires_at,
        }))
    }

    async fn delete(&self, token: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM password_resets WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
