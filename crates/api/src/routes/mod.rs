//! HTTP routes

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::{authorize, AuthStrategy, RouteAuthTable};
use crate::state::AppState;

pub mod auth;

/// Which strategies admit each route. Anything missing from the table
/// requires a bearer token, so new routes ship protected unless listed
/// here as open.
fn route_auth_table() -> RouteAuthTable {
    use AuthStrategy::{ApiKey, Bearer, None};

    RouteAuthTable::new()
        .route("/health", &[None])
        .route("/api/v1/auth/sign-up", &[None])
        .route("/api/v1/auth/sign-in", &[None])
        .route("/api/v1/auth/refresh-tokens", &[None])
        .route("/api/v1/auth/forgot-password", &[None])
        .route("/api/v1/auth/reset-password", &[None])
        .route("/api/v1/auth/google", &[None])
        .route("/api/v1/auth/me", &[Bearer, ApiKey])
    // 2fa/generate and api-keys take the default: Bearer only
}

/// Assemble the full router. One guard layer resolves each request's
/// strategies from the route table at dispatch time.
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state().with_routes(route_auth_table());

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/sign-up", post(auth::sign_up))
        .route("/api/v1/auth/sign-in", post(auth::sign_in))
        .route("/api/v1/auth/refresh-tokens", post(auth::refresh_tokens))
        .route("/api/v1/auth/forgot-password", post(auth::forgot_password))
        .route("/api/v1/auth/reset-password", post(auth::reset_password))
        .route("/api/v1/auth/google", post(auth::google_sign_in))
        .route("/api/v1/auth/2fa/generate", post(auth::generate_2fa))
        .route("/api/v1/auth/api-keys", post(auth::create_api_key))
        .route("/api/v1/auth/me", get(auth::me))
        .layer(middleware::from_fn_with_state(auth_state, authorize))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
