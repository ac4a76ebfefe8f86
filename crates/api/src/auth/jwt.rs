//! JWT signing and validation
//!
//! HS256 tokens carrying issuer, audience, and a type tag so access and
//! refresh tokens can never be swapped for each other. Access tokens
//! carry the subject's email; refresh tokens carry the rotation id that
//! is validated against the refresh-token store.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

/// Leeway applied to exp/nbf checks, in seconds.
const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Rotation identifier, present on refresh tokens only.
    #[serde(rename = "rti", skip_serializing_if = "Option::is_none")]
    pub refresh_token_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token type does not match the operation")]
    WrongTokenType,
    #[error("Invalid or expired token")]
    Invalid,
}

impl From<JwtError> for ApiError {
    fn from(_: JwtError) -> Self {
        // Malformed, expired, wrong signature, wrong type: all opaque.
        ApiError::Unauthorized
    }
}

#[derive(Clone)]
pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtSigner {
    pub fn new(
        secret: &str,
        issuer: &str,
        audience: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Sign a short-lived access token (subject + email claim).
    pub fn sign_access_token(&self, user_id: Uuid, email: &str) -> Result<String, JwtError> {
        self.sign(
            user_id,
            self.access_ttl_secs,
            TokenType::Access,
            Some(email.to_string()),
            None,
        )
    }

    /// Sign a long-lived refresh token carrying its rotation identifier.
    pub fn sign_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token_id: Uuid,
    ) -> Result<String, JwtError> {
        self.sign(
            user_id,
            self.refresh_ttl_secs,
            TokenType::Refresh,
            None,
            Some(refresh_token_id),
        )
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token)?;
        if claims.typ != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token)?;
        if claims.typ != TokenType::Refresh || claims.refresh_token_id.is_none() {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    fn sign(
        &self,
        user_id: Uuid,
        ttl_secs: i64,
        typ: TokenType,
        email: Option<String>,
        refresh_token_id: Option<Uuid>,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user_id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ttl_secs,
            typ,
            email,
            refresh_token_id,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| JwtError::Invalid)
    }

    /// Signature, issuer, audience, and expiry checks. HS256 only.
    fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = LEEWAY_SECS;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| JwtError::Invalid)
    }
}
