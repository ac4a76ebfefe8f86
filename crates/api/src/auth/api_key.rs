//! API key generation and validation
//!
//! Issued keys have the form `<opaque-id>.<secret>`: the id is a plain
//! UUID used only for lookup, the secret is the high-entropy portion.
//! Only an HMAC-SHA256 of the secret is stored, so the composite key can
//! be shown to the caller exactly once and never recovered afterwards.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

/// Bytes of entropy in the secret portion.
const SECRET_LEN: usize = 32;

/// A freshly issued key. `composite` is returned to the caller once;
/// `id` and `secret_hash` are what gets persisted.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub composite: String,
    pub id: Uuid,
    pub secret_hash: String,
}

#[derive(Clone)]
pub struct ApiKeyManager {
    hmac_secret: Vec<u8>,
}

impl ApiKeyManager {
    pub fn new(hmac_secret: &str) -> Self {
        Self {
            hmac_secret: hmac_secret.as_bytes().to_vec(),
        }
    }

    /// Generate a new key pair: random UUID id plus a 256-bit secret.
    pub fn generate_key(&self) -> ApiResult<GeneratedApiKey> {
        let id = Uuid::new_v4();
        let mut buf = [0u8; SECRET_LEN];
        rand::rng().fill_bytes(&mut buf);
        let secret = URL_SAFE_NO_PAD.encode(buf);
        let secret_hash = self.hash_secret(&secret)?;

        Ok(GeneratedApiKey {
            composite: format!("{id}.{secret}"),
            id,
            secret_hash,
        })
    }

    /// Pure parse of the lookup id out of a composite key.
    pub fn extract_id(key: &str) -> ApiResult<Uuid> {
        let (id, secret) = key.split_once('.').ok_or(ApiError::Format)?;
        if secret.is_empty() {
            return Err(ApiError::Format);
        }
        Uuid::parse_str(id).map_err(|_| ApiError::Format)
    }

    /// Keyed hash of the secret portion, hex-encoded.
    pub fn hash_secret(&self, secret: &str) -> ApiResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_secret)
            .map_err(|e| ApiError::Internal(format!("HMAC init failed: {e}")))?;
        mac.update(secret.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Recompute the keyed hash of the presented key's secret portion and
    /// compare against the stored hash in constant time. Malformed keys
    /// validate false rather than erroring.
    pub fn validate(&self, presented_key: &str, stored_hash: &str) -> bool {
        let Some((_, secret)) = presented_key.split_once('.') else {
            return false;
        };
        let Ok(computed) = self.hash_secret(secret) else {
            return false;
        };
        computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-api-key-hmac-secret-32chars!";

    #[test]
    fn test_generated_key_format() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let key = manager.generate_key().expect("Should generate key");

        let (id, secret) = key.composite.split_once('.').expect("Has separator");
        // Canonical hyphenated uuid, so the id portion round-trips through
        // the same text form the database hands back
        assert_eq!(id.len(), 36);
        assert_eq!(id, key.id.to_string());
        assert_eq!(id.parse::<Uuid>().expect("Valid uuid"), key.id);
        // 32 bytes base64url without padding
        assert_eq!(secret.len(), 43);
    }

    #[test]
    fn test_extract_id_round_trip() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let key = manager.generate_key().expect("Should generate key");

        let extracted = ApiKeyManager::extract_id(&key.composite).expect("Should extract");
        assert_eq!(extracted, key.id);
    }

    #[test]
    fn test_extract_id_rejects_malformed_keys() {
        assert!(matches!(
            ApiKeyManager::extract_id("no-separator"),
            Err(ApiError::Format)
        ));
        assert!(matches!(
            ApiKeyManager::extract_id("not-a-uuid.secret"),
            Err(ApiError::Format)
        ));
        assert!(matches!(
            ApiKeyManager::extract_id(&format!("{}.", Uuid::new_v4())),
            Err(ApiError::Format)
        ));
        assert!(matches!(
            ApiKeyManager::extract_id(""),
            Err(ApiError::Format)
        ));
    }

    #[test]
    fn test_validate_accepts_issued_key() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let key = manager.generate_key().expect("Should generate key");

        assert!(manager.validate(&key.composite, &key.secret_hash));
    }

    #[test]
    fn test_validate_rejects_tampered_secret() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let key = manager.generate_key().expect("Should generate key");

        // Flip the last character of the secret portion
        let mut tampered = key.composite.clone();
        let last = if tampered.ends_with('A') { 'B' } else { 'A' };
        tampered.pop();
        tampered.push(last);

        assert!(!manager.validate(&tampered, &key.secret_hash));
    }

    #[test]
    fn test_validate_rejects_truncated_key() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let key = manager.generate_key().expect("Should generate key");

        let truncated = &key.composite[..key.composite.len() - 1];
        assert!(!manager.validate(truncated, &key.secret_hash));
    }

    #[test]
    fn test_validate_malformed_key_is_false_not_error() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        assert!(!manager.validate("garbage-without-dot", "whatever"));
        assert!(!manager.validate("", ""));
    }

    #[test]
    fn test_different_hmac_secrets_do_not_cross_validate() {
        let a = ApiKeyManager::new("secret-a");
        let b = ApiKeyManager::new("secret-b");
        let key = a.generate_key().expect("Should generate key");

        assert!(!b.validate(&key.composite, &key.secret_hash));
    }

    #[test]
    fn test_hash_is_deterministic_per_secret() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let key = manager.generate_key().expect("Should generate key");
        let (_, secret) = key.composite.split_once('.').expect("Has separator");

        assert_eq!(
            manager.hash_secret(secret).expect("Should hash"),
            key.secret_hash
        );
    }

    #[test]
    fn test_different_keys_different_hashes() {
        let manager = ApiKeyManager::new(TEST_SECRET);
        let k1 = manager.generate_key().expect("Should generate key");
        let k2 = manager.generate_key().expect("Should generate key");

        assert_ne!(k1.composite, k2.composite);
        assert_ne!(k1.secret_hash, k2.secret_hash);
    }
}
