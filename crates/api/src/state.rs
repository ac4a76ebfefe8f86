//! Application state

use std::sync::Arc;

use redis::aio::ConnectionManager;
use reqwest::Client;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::{
    auth::{
        ApiKeyManager, AuthService, AuthState, GoogleAuthService, JwtSigner,
        RedisRefreshTokenStore, RouteAuthTable, TotpService,
    },
    config::Config,
    db::{ApiKeyStore, PgApiKeyStore, PgPasswordResetStore, PgUserStore, UserStore},
    email::MailService,
};

/// Shared application state. Everything in here is cheap to clone;
/// handlers and the guard reach their collaborators through it.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub google: Arc<GoogleAuthService>,
    pub users: Arc<dyn UserStore>,
    pub jwt: JwtSigner,
    pub api_keys: ApiKeyManager,
    pub api_key_store: Arc<dyn ApiKeyStore>,
}

impl AppState {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: &Config) -> Self {
        let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
        let api_key_store: Arc<dyn ApiKeyStore> = Arc::new(PgApiKeyStore::new(pool.clone()));

        let jwt = JwtSigner::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        );
        let api_keys = ApiKeyManager::new(&config.api_key_hmac_secret);

        let mail = MailService::from_env();
        if mail.is_enabled() {
            tracing::info!("Password-reset email delivery enabled");
        } else {
            tracing::warn!("Password-reset email delivery not configured (missing RESEND_API_KEY)");
        }

        let http_client = Client::new();
        if config.google_client_id.is_empty() {
            tracing::warn!("Google sign-in not configured (missing GOOGLE_CLIENT_ID)");
        } else {
            tracing::info!("Google sign-in enabled");
        }

        let auth = Arc::new(AuthService {
            users: users.clone(),
            resets: Arc::new(PgPasswordResetStore::new(pool.clone())),
            refresh_tokens: Arc::new(RedisRefreshTokenStore::new(redis)),
            api_key_store: api_key_store.clone(),
            api_keys: api_keys.clone(),
            jwt: jwt.clone(),
            totp: TotpService::new(&config.tfa_app_name),
            mail,
            clock: OffsetDateTime::now_utc,
            reset_token_ttl: Duration::seconds(config.reset_token_ttl_secs),
        });

        let google = Arc::new(GoogleAuthService::new(
            users.clone(),
            http_client,
            config.google_client_id.clone(),
        ));

        Self {
            auth,
            google,
            users,
            jwt,
            api_keys,
            api_key_store,
        }
    }

    /// State subset the guard middleware runs on. The route table starts
    /// empty; the router swaps in its own via `with_routes`.
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt: self.jwt.clone(),
            api_keys: self.api_keys.clone(),
            api_key_store: self.api_key_store.clone(),
            routes: Arc::new(RouteAuthTable::new()),
        }
    }
}
