//! Request authentication guard for Axum
//!
//! Dispatch is data-driven: a [`RouteAuthTable`] maps each route path to
//! an ordered list of strategies, and a single middleware resolves the
//! list at request time. Strategies run in order; the first success
//! admits the request, and when every strategy fails the error from the
//! last attempt is the one returned. A path with no entry requires
//! Bearer, so a route only becomes public by saying so.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::db::ApiKeyStore;
use crate::error::ApiError;

use super::api_key::ApiKeyManager;
use super::jwt::JwtSigner;

/// How a request may prove its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `Authorization: Bearer <access-token>`
    Bearer,
    /// `Authorization: ApiKey <uuid>.<secret>`
    ApiKey,
    /// No check at all. Short-circuits the whole guard.
    None,
}

/// The identity a guard attaches to an admitted request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub auth_method: AuthMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthMethod {
    AccessToken,
    ApiKey { key_id: Uuid },
}

const DEFAULT_STRATEGIES: &[AuthStrategy] = &[AuthStrategy::Bearer];

/// Route path to ordered strategy list. Paths not in the table fall back
/// to [`DEFAULT_STRATEGIES`].
#[derive(Debug, Clone, Default)]
pub struct RouteAuthTable {
    entries: HashMap<String, Vec<AuthStrategy>>,
}

impl RouteAuthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, path: &str, strategies: &[AuthStrategy]) -> Self {
        self.entries.insert(path.to_string(), strategies.to_vec());
        self
    }

    pub fn strategies_for(&self, path: &str) -> &[AuthStrategy] {
        self.entries
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(DEFAULT_STRATEGIES)
    }
}

/// State the guard needs, shared across all routes.
#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtSigner,
    pub api_keys: ApiKeyManager,
    pub api_key_store: Arc<dyn ApiKeyStore>,
    pub routes: Arc<RouteAuthTable>,
}

impl AuthState {
    pub fn with_routes(mut self, routes: RouteAuthTable) -> Self {
        self.routes = Arc::new(routes);
        self
    }
}

fn header_value<'r, B>(request: &'r Request<B>, prefix: &str) -> Option<&'r str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix(prefix))
}

fn extract_bearer_token<B>(request: &Request<B>) -> Option<&str> {
    header_value(request, "Bearer ")
}

fn extract_api_key<B>(request: &Request<B>) -> Option<&str> {
    header_value(request, "ApiKey ")
}

/// Run the strategy list against a request.
///
/// `Ok(None)` means an explicit `None` strategy admitted the request
/// anonymously. Failures short-circuit nothing: every remaining strategy
/// still gets its chance, and the last error wins.
pub async fn authenticate<B>(
    state: &AuthState,
    request: &Request<B>,
    strategies: &[AuthStrategy],
) -> Result<Option<AuthUser>, ApiError> {
    let mut last_error = ApiError::Unauthorized;

    for strategy in strategies {
        let attempt = match strategy {
            AuthStrategy::None => return Ok(None),
            AuthStrategy::Bearer => authenticate_bearer(state, request),
            AuthStrategy::ApiKey => authenticate_api_key(state, request).await,
        };
        match attempt {
            Ok(user) => return Ok(Some(user)),
            Err(err) => last_error = err,
        }
    }

    Err(last_error)
}

fn authenticate_bearer<B>(state: &AuthState, request: &Request<B>) -> Result<AuthUser, ApiError> {
    let token = extract_bearer_token(request).ok_or(ApiError::Unauthorized)?;
    let claims = state.jwt.validate_access_token(token)?;
    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
        auth_method: AuthMethod::AccessToken,
    })
}

async fn authenticate_api_key<B>(
    state: &AuthState,
    request: &Request<B>,
) -> Result<AuthUser, ApiError> {
    let key = extract_api_key(request).ok_or(ApiError::Unauthorized)?;

    // The opaque id narrows the lookup to one row; the HMAC comparison
    // decides, in constant time.
    let key_id = ApiKeyManager::extract_id(key).map_err(|_| ApiError::Unauthorized)?;
    let owner = state
        .api_key_store
        .find_by_opaque_id(key_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !state.api_keys.validate(key, &owner.key_hash) {
        tracing::warn!(key_id = %key_id, "API key signature mismatch");
        return Err(ApiError::Unauthorized);
    }

    Ok(AuthUser {
        user_id: owner.user_id,
        email: Some(owner.email),
        auth_method: AuthMethod::ApiKey { key_id },
    })
}

/// Guard middleware applied once to the whole router. Looks up the
/// strategy list for the request path and runs it.
pub async fn authorize(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    // Authenticate against the body-less head: `Body` is `!Sync`, so
    // borrowing the full request across the store lookup would make this
    // future `!Send` and unusable as a router layer.
    let (parts, body) = request.into_parts();
    let head = Request::from_parts(parts, ());
    let strategies = state.routes.strategies_for(head.uri().path());
    match authenticate(&state, &head, strategies).await {
        Ok(Some(auth_user)) => {
            let (parts, ()) = head.into_parts();
            let mut request = Request::from_parts(parts, body);
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Ok(None) => {
            let (parts, ()) = head.into_parts();
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => {
            tracing::warn!(path = %head.uri().path(), error = %err, "Request rejected by guard");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::MemoryDb;
    use axum::body::Body;

    fn state_with_db(db: Arc<MemoryDb>) -> AuthState {
        AuthState {
            jwt: JwtSigner::new("test-secret-key-at-least-32-chars!", "basalt", "basalt", 3600, 86_400),
            api_keys: ApiKeyManager::new("test-api-key-hmac-secret"),
            api_key_store: db,
            routes: Arc::new(RouteAuthTable::new()),
        }
    }

    fn state() -> AuthState {
        state_with_db(Arc::new(MemoryDb::default()))
    }

    async fn seed_user_with_key(db: &MemoryDb, state: &AuthState) -> (Uuid, super::super::api_key::GeneratedApiKey) {
        let user = crate::db::UserStore::create(
            db,
            crate::db::NewUser {
                email: "a@b.com".to_string(),
                username: None,
                first_name: None,
                last_name: None,
                password_hash: "x".to_string(),
            },
        )
        .await
        .unwrap();
        let key = state.api_keys.generate_key().unwrap();
        crate::db::ApiKeyStore::create(db, key.id, &key.secret_hash, user.id)
            .await
            .unwrap();
        (user.id, key)
    }

    fn request_with_auth(value: &str) -> Request {
        Request::builder()
            .uri("/protected")
            .header(AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    fn bare_request() -> Request {
        Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_bearer_strategy_accepts_valid_access_token() {
        let state = state();
        let user_id = Uuid::new_v4();
        let token = state.jwt.sign_access_token(user_id, "a@b.com").unwrap();
        let request = request_with_auth(&format!("Bearer {token}"));

        let user = authenticate(&state, &request, &[AuthStrategy::Bearer])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.auth_method, AuthMethod::AccessToken);
    }

    #[tokio::test]
    async fn test_bearer_strategy_rejects_refresh_token() {
        let state = state();
        let token = state
            .jwt
            .sign_refresh_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let request = request_with_auth(&format!("Bearer {token}"));

        let result = authenticate(&state, &request, &[AuthStrategy::Bearer]).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let state = state();
        let result = authenticate(&state, &bare_request(), &[AuthStrategy::Bearer]).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_none_strategy_admits_anonymously() {
        let state = state();
        let admitted = authenticate(&state, &bare_request(), &[AuthStrategy::None])
            .await
            .unwrap();
        assert!(admitted.is_none());
    }

    #[tokio::test]
    async fn test_api_key_strategy_round_trip() {
        let db = Arc::new(MemoryDb::default());
        let state = state_with_db(db.clone());
        let (user_id, key) = seed_user_with_key(&db, &state).await;

        let request = request_with_auth(&format!("ApiKey {}", key.composite));
        let admitted = authenticate(&state, &request, &[AuthStrategy::ApiKey])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admitted.user_id, user_id);
        assert_eq!(admitted.auth_method, AuthMethod::ApiKey { key_id: key.id });
    }

    #[tokio::test]
    async fn test_api_key_with_tampered_secret_rejected() {
        let db = Arc::new(MemoryDb::default());
        let state = state_with_db(db.clone());
        let (_user_id, key) = seed_user_with_key(&db, &state).await;

        let tampered = format!("{}x", key.composite);
        let request = request_with_auth(&format!("ApiKey {tampered}"));
        let result = authenticate(&state, &request, &[AuthStrategy::ApiKey]).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_multi_strategy_falls_through_to_api_key() {
        let db = Arc::new(MemoryDb::default());
        let state = state_with_db(db.clone());
        let (_user_id, key) = seed_user_with_key(&db, &state).await;

        // Not a bearer token, so the first strategy fails and the second admits
        let request = request_with_auth(&format!("ApiKey {}", key.composite));
        let admitted = authenticate(
            &state,
            &request,
            &[AuthStrategy::Bearer, AuthStrategy::ApiKey],
        )
        .await
        .unwrap();
        assert!(admitted.is_some());
    }

    #[test]
    fn test_route_table_defaults_to_bearer() {
        let table = RouteAuthTable::new().route("/open", &[AuthStrategy::None]);
        assert_eq!(table.strategies_for("/open"), &[AuthStrategy::None]);
        assert_eq!(table.strategies_for("/anything-else"), &[AuthStrategy::Bearer]);
    }

    #[test]
    fn test_route_table_preserves_strategy_order() {
        let table = RouteAuthTable::new()
            .route("/either", &[AuthStrategy::Bearer, AuthStrategy::ApiKey]);
        assert_eq!(
            table.strategies_for("/either"),
            &[AuthStrategy::Bearer, AuthStrategy::ApiKey]
        );
    }

    #[tokio::test]
    async fn test_all_strategies_failing_surfaces_error() {
        let state = state();
        let request = request_with_auth("Bearer garbage");
        let result = authenticate(
            &state,
            &request,
            &[AuthStrategy::Bearer, AuthStrategy::ApiKey],
        )
        .await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }
}
