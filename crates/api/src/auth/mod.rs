//! Authentication module for Basalt

pub mod api_key;
pub mod google;
pub mod guard;
pub mod jwt;
pub mod password;
pub mod refresh_store;
pub mod service;
pub mod totp;

pub use api_key::ApiKeyManager;
pub use google::GoogleAuthService;
pub use guard::{authorize, AuthMethod, AuthState, AuthStrategy, AuthUser, RouteAuthTable};
pub use jwt::{Claims, JwtSigner, TokenType};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use refresh_store::{RedisRefreshTokenStore, RefreshTokenStore};
pub use service::{AuthService, SignInPayload, SignUpPayload, TokenPair};
pub use totp::TotpService;
