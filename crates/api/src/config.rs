//! Service configuration loaded from environment variables

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Access token lifetime in seconds (short-lived).
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds (long-lived).
    pub refresh_token_ttl_secs: i64,
    pub api_key_hmac_secret: String,
    /// Issuer name embedded in otpauth provisioning URIs.
    pub tfa_app_name: String,
    pub google_client_id: String,
    /// Password-reset token lifetime in seconds.
    pub reset_token_ttl_secs: i64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "basalt".to_string()),
            jwt_audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "basalt".to_string()),
            access_token_ttl_secs: parse_or("ACCESS_TOKEN_TTL_SECS", 3600)?,
            refresh_token_ttl_secs: parse_or("REFRESH_TOKEN_TTL_SECS", 86_400)?,
            api_key_hmac_secret: required("API_KEY_HMAC_SECRET")?,
            tfa_app_name: std::env::var("TFA_APP_NAME").unwrap_or_else(|_| "Basalt".to_string()),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            reset_token_ttl_secs: parse_or("RESET_TOKEN_TTL_SECS", 420)?,
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or(key: &str, default: i64) -> anyhow::Result<i64> {
    match std::env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("{key} must be an integer")),
        Err(_) => Ok(default),
    }
}
