//! Authentication endpoints
//!
//! Thin handlers: parse the payload, call the service, shape the
//! response. Policy (who may call what) lives in the router layers, not
//! here.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{AuthUser, SignInPayload, SignUpPayload, TokenPair};
use crate::db::User;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenPayload {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordPayload {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTokenPayload {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub two_factor_enabled: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sign_in_at: Option<OffsetDateTime>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            two_factor_enabled: user.two_factor_enabled,
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpPayload>,
) -> ApiResult<(StatusCode, Json<TokenPair>)> {
    let pair = state.auth.sign_up(payload).await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInPayload>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.auth.sign_in(payload).await?;
    Ok(Json(pair))
}

pub async fn refresh_tokens(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenPayload>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.auth.refresh_tokens(&payload.refresh_token).await?;
    Ok(Json(pair))
}

/// The reset token travels by email only; this response never carries it.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> ApiResult<Json<Value>> {
    state.auth.forgot_password(&payload.email).await?;
    Ok(Json(json!({
        "message": "Password reset instructions sent"
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(json!({ "message": "Password updated" })))
}

pub async fn google_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<GoogleTokenPayload>,
) -> ApiResult<Json<TokenPair>> {
    let user = state.google.authenticate(&payload.token).await?;
    let pair = state.auth.generate_tokens(&user).await?;
    Ok(Json(pair))
}

/// Enroll the signed-in user in 2FA. The secret and provisioning URI are
/// shown exactly once, at enrollment.
pub async fn generate_2fa(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let email = auth_user.email.clone().ok_or(ApiError::Unauthorized)?;
    let generated = state
        .auth
        .enable_two_factor(auth_user.user_id, &email)
        .await?;
    Ok(Json(json!({
        "secret": generated.secret,
        "uri": generated.uri,
    })))
}

/// Mint an API key for the signed-in user. The composite key appears in
/// this response and nowhere else, ever again.
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let key = state.auth.issue_api_key(auth_user.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": key.id, "apiKey": key.composite })),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    // A verified token for a user who has since been deleted is no
    // longer a valid identity.
    let user = state
        .users
        .find_by_id(auth_user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user.into()))
}
