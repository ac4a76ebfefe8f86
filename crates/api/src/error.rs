//! API error taxonomy
//!
//! Every failure surfaced by the core maps onto one of these variants.
//! Persistence-layer errors are translated at the service boundary and
//! never leaked raw to callers. Authentication failures that could aid
//! credential guessing (sign-in, refresh, API key) all collapse into the
//! same opaque message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Wrong email, password, or 2FA code. Always the same message so the
    /// caller cannot tell which part was wrong.
    #[error("These credentials do not match our records")]
    BadCredentials,
    #[error("{0}")]
    BadRequest(String),
    /// Invalid, expired, or replayed token; failed API key; failed guard.
    #[error("Unauthorized")]
    Unauthorized,
    /// Duplicate registration (unique constraint on email or google_id).
    #[error("An account with this identity already exists")]
    Conflict,
    /// Malformed API key string.
    #[error("Malformed API key")]
    Format,
    /// A presented refresh-token id that is absent or superseded in the
    /// store. Collapsed to `Unauthorized` before it reaches a caller.
    #[error("Refresh token has been invalidated")]
    InvalidatedRefreshToken,
    #[error("Database error")]
    Database(#[from] sqlx::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadCredentials | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidatedRefreshToken | ApiError::Format => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Database/internal details stay in the logs, not the response.
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!(error = ?e, "Database error");
                "Internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal server error".to_string()
            }
            ApiError::InvalidatedRefreshToken => "Unauthorized".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
