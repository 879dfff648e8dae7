//! Client-side authentication: session lifecycle, token refresh and the
//! external identity provider.

pub mod manager;
pub mod provider;
pub mod token;

use thiserror::Error;
use wayfare_store::StoreError;

pub use manager::{AuthState, IdentitySync, RefreshTimer, SessionManager};
pub use provider::{AuthProvider, GoTrueProvider, ProviderSession, ProviderUser};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Auth provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Auth provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Identity sync failed: {0}")]
    Sync(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type SessionResult<T> = Result<T, SessionError>;
