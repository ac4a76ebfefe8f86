//! In-memory store implementations for exercising the authentication
//! service without a database. Test builds only.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::refresh_store::RefreshTokenStore;
use crate::error::{ApiError, ApiResult};

use super::{
    ApiKeyOwner, ApiKeyStore, NewUser, PasswordReset, PasswordResetStore, User, UserStore,
    UserWithCredential,
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: Option<String>,
}

/// One struct implementing all three persistence traits, so a single
/// `Arc<MemoryDb>` can be handed to the service as each collaborator.
#[derive(Default)]
pub struct MemoryDb {
    users: Mutex<Vec<StoredUser>>,
    resets: Mutex<HashMap<String, PasswordReset>>,
    api_keys: Mutex<HashMap<Uuid, ApiKeyOwner>>,
}

impl MemoryDb {
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<UserWithCredential>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|s| s.user.email == email.to_lowercase())
            .map(|s| UserWithCredential {
                user: s.user.clone(),
                password_hash: s.password_hash.clone(),
            }))
    }

    async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|s| s.user.id == id).map(|s| s.user.clone()))
    }

    async fn find_by_google_id(&self, google_id: &str) -> ApiResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|s| s.user.google_id.as_deref() == Some(google_id))
            .map(|s| s.user.clone()))
    }

    async fn create(&self, new: NewUser) -> ApiResult<User> {
        let mut users = self.users.lock().unwrap();
        let email = new.email.to_lowercase();
        if users.iter().any(|s| s.user.email == email) {
            return Err(ApiError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            google_id: None,
            two_factor_secret: None,
            two_factor_enabled: false,
            last_sign_in_at: None,
        };
        users.push(StoredUser {
            user: user.clone(),
            password_hash: Some(new.password_hash),
        });
        Ok(user)
    }

    async fn create_google_user(&self, email: &str, google_id: &str) -> ApiResult<User> {
        let mut users = self.users.lock().unwrap();
        let email = email.to_lowercase();
        if users
            .iter()
            .any(|s| s.user.email == email || s.user.google_id.as_deref() == Some(google_id))
        {
            return Err(ApiError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            username: None,
            first_name: None,
            last_name: None,
            google_id: Some(google_id.to_string()),
            two_factor_secret: None,
            two_factor_enabled: false,
            last_sign_in_at: None,
        };
        users.push(StoredUser {
            user: user.clone(),
            password_hash: None,
        });
        Ok(user)
    }

    async fn replace_password(
        &self,
        email: &str,
        password_hash: &str,
        reset_token: &str,
    ) -> ApiResult<()> {
        let mut users = self.users.lock().unwrap();
        let stored = users
            .iter_mut()
            .find(|s| s.user.email == email.to_lowercase())
            .ok_or_else(|| ApiError::BadRequest("Invalid password reset token.".to_string()))?;
        stored.password_hash = Some(password_hash.to_string());
        self.resets.lock().unwrap().remove(reset_token);
        Ok(())
    }

    async fn set_two_factor(&self, user_id: Uuid, secret: &str) -> ApiResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(stored) = users.iter_mut().find(|s| s.user.id == user_id) {
            stored.user.two_factor_secret = Some(secret.to_string());
            stored.user.two_factor_enabled = true;
        }
        Ok(())
    }

    async fn touch_last_sign_in(&self, user_id: Uuid) -> ApiResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(stored) = users.iter_mut().find(|s| s.user.id == user_id) {
            stored.user.last_sign_in_at = Some(time::OffsetDateTime::now_utc());
        }
        Ok(())
    }
}

#[async_trait]
impl PasswordResetStore for MemoryDb {
    async fn create(&self, reset: PasswordReset) -> ApiResult<()> {
        self.resets
            .lock()
            .unwrap()
            .insert(reset.token.clone(), reset);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> ApiResult<Option<PasswordReset>> {
        Ok(self.resets.lock().unwrap().get(token).cloned())
    }

    async fn delete(&self, token: &str) -> ApiResult<()> {
        self.resets.lock().unwrap().remove(token);
        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for MemoryDb {
    async fn find_by_opaque_id(&self, id: Uuid) -> ApiResult<Option<ApiKeyOwner>> {
        Ok(self.api_keys.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, id: Uuid, key_hash: &str, user_id: Uuid) -> ApiResult<()> {
        let email = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.user.id == user_id)
            .map(|s| s.user.email.clone())
            .unwrap_or_default();
        self.api_keys.lock().unwrap().insert(
            id,
            ApiKeyOwner {
                key_hash: key_hash.to_string(),
                user_id,
                email,
            },
        );
        Ok(())
    }
}

/// Process-local refresh-token store with the same overwrite semantics as
/// the Redis implementation.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    entries: Mutex<HashMap<Uuid, Uuid>>,
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, user_id: Uuid, token_id: Uuid) -> ApiResult<()> {
        self.entries.lock().unwrap().insert(user_id, token_id);
        Ok(())
    }

    async fn validate(&self, user_id: Uuid, token_id: Uuid) -> ApiResult<()> {
        match self.entries.lock().unwrap().get(&user_id) {
            Some(stored) if *stored == token_id => Ok(()),
            _ => Err(ApiError::InvalidatedRefreshToken),
        }
    }

    async fn invalidate(&self, user_id: Uuid) -> ApiResult<()> {
        self.entries.lock().unwrap().remove(&user_id);
        Ok(())
    }
}
