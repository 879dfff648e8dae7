use thiserror::Error;
use wayfare_session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 that survived one forced refresh, or no session to refresh
    #[error("Authentication required")]
    Unauthorized,

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
