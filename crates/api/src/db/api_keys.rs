//! Postgres-backed API key persistence

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiResult;

use super::{ApiKeyOwner, ApiKeyStore};

#[derive(Debug, FromRow)]
struct ApiKeyOwnerRow {
    key_hash: String,
    user_id: Uuid,
    email: String,
}

#[derive(Clone)]
pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn find_by_opaque_id(&self, id: Uuid) -> ApiResult<Option<ApiKeyOwner>> {
        let row: Option<ApiKeyOwnerRow> = sqlx::query_as(
            r#"
            SELECT ak.key_hash, u.id AS user_id, u.email
            FROM api_keys ak
            JOIN users u ON u.id = ak.user_id
            WHERE ak.id = $1
              AND u.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ApiKeyOwner {
            key_hash: r.key_hash,
            user_id: r.user_id,
            email: r.email,
        }))
    }

    async fn create(&self, id: Uuid, key_hash: &str, user_id: Uuid) -> ApiResult<()> {
        sqlx::query("INSERT INTO api_keys (id, key_hash, user_id) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(key_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
