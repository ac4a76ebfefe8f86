//! Google sign-in
//!
//! Verifies a Google-issued ID token against the tokeninfo endpoint,
//! then maps the external subject to a local account: an existing user
//! is signed in, an unknown one is provisioned on the spot. Token
//! verification failures all surface as Unauthorized.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;

use crate::db::{User, UserStore};
use crate::error::{ApiError, ApiResult};

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Subset of the tokeninfo response we act on.
#[derive(Debug, Clone, Deserialize)]
struct GoogleTokenInfo {
    /// The client the token was minted for. Must be ours.
    aud: String,
    /// Google's stable subject identifier for the account.
    sub: String,
    email: String,
}

pub struct GoogleAuthService {
    users: Arc<dyn UserStore>,
    http_client: Client,
    client_id: String,
    tokeninfo_url: String,
}

impl GoogleAuthService {
    pub fn new(users: Arc<dyn UserStore>, http_client: Client, client_id: String) -> Self {
        Self {
            users,
            http_client,
            client_id,
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_tokeninfo_url(mut self, url: String) -> Self {
        self.tokeninfo_url = url;
        self
    }

    /// Resolve a Google ID token to a local user, creating the account
    /// on first sign-in.
    pub async fn authenticate(&self, token: &str) -> ApiResult<User> {
        let info = self.verify_token(token).await?;

        if let Some(user) = self.users.find_by_google_id(&info.sub).await? {
            return Ok(user);
        }

        tracing::info!(email = %info.email, "Provisioning account for first Google sign-in");
        self.users.create_google_user(&info.email, &info.sub).await
    }

    async fn verify_token(&self, token: &str) -> ApiResult<GoogleTokenInfo> {
        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Google tokeninfo request failed");
                ApiError::Unauthorized
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Google rejected ID token");
            return Err(ApiError::Unauthorized);
        }

        let info = response
            .json::<GoogleTokenInfo>()
            .await
            .map_err(|_| ApiError::Unauthorized)?;

        // A valid Google token for some other application is still not
        // valid here.
        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "ID token audience mismatch");
            return Err(ApiError::Unauthorized);
        }

        Ok(info)
    }
}
