//! Postgres-backed user persistence

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

use super::{NewUser, User, UserStore, UserWithCredential};

const USER_COLUMNS: &str = "u.id, u.email, u.username, u.first_name, u.last_name, u.google_id, \
     u.two_factor_secret, u.two_factor_enabled, u.last_sign_in_at";

// Same list without the table alias, for INSERT ... RETURNING.
const RETURNING_COLUMNS: &str = "id, email, username, first_name, last_name, google_id, \
     two_factor_secret, two_factor_enabled, last_sign_in_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    google_id: Option<String>,
    two_factor_secret: Option<String>,
    two_factor_enabled: bool,
    last_sign_in_at: Option<OffsetDateTime>,
}

#[derive(Debug, FromRow)]
struct UserWithCredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            google_id: row.google_id,
            two_factor_secret: row.two_factor_secret,
            two_factor_enabled: row.two_factor_enabled,
            last_sign_in_at: row.last_sign_in_at,
        }
    }
}

/// Translate a unique-constraint violation into the Conflict variant.
/// Sign-up relies on the constraint instead of a pre-check so concurrent
/// registrations cannot race past each other.
fn map_unique_violation(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict,
        _ => ApiError::Database(e),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<UserWithCredential>> {
        let row: Option<UserWithCredentialRow> = sqlx::query_as(&format!(
            r#"
            SELECT {USER_COLUMNS}, pc.password_hash
            FROM users u
            LEFT JOIN password_credentials pc ON pc.user_id = u.id
            WHERE u.email = LOWER($1)
              AND u.deleted_at IS NULL
            "#
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserWithCredential {
            user: r.user.into(),
            password_hash: r.password_hash,
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1 AND u.deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_google_id(&self, google_id: &str) -> ApiResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.google_id = $1 AND u.deleted_at IS NULL"
        ))
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, user: NewUser) -> ApiResult<User> {
        let mut tx = self.pool.begin().await?;

        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name)
            VALUES (LOWER($1), $2, $3, $4)
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query("INSERT INTO password_credentials (user_id, password_hash) VALUES ($1, $2)")
            .bind(row.id)
            .bind(&user.password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    async fn create_google_user(&self, email: &str, google_id: &str) -> ApiResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (email, google_id)
            VALUES (LOWER($1), $2)
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(google_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(row.into())
    }

    async fn replace_password(
        &self,
        email: &str,
        password_hash: &str,
        reset_token: &str,
    ) -> ApiResult<()> {
        // Credential replacement and reset consumption are one unit: a
        // reset request must never survive a successful reset.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM password_credentials
            WHERE user_id = (SELECT id FROM users WHERE email = LOWER($1))
            "#,
        )
        .bind(email)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO password_credentials (user_id, password_hash)
            SELECT id, $2 FROM users WHERE email = LOWER($1) AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(ApiError::BadRequest(
                "Invalid password reset token.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM password_resets WHERE token = $1")
            .bind(reset_token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_two_factor(&self, user_id: Uuid, secret: &str) -> ApiResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET two_factor_secret = $2, two_factor_enabled = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(secret)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_sign_in(&self, user_id: Uuid) -> ApiResult<()> {
        sqlx::query("UPDATE users SET last_sign_in_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
