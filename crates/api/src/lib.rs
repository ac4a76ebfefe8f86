// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Basalt API Library
//!
//! Credential verification, token issuance and rotation, two-factor
//! enrollment, API keys, and Google sign-in for the Basalt API server.

pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
