use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// The API answered with `error: true`
    #[error("{0}")]
    Rejected(String),

    #[error("Story not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid subscription key: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl ApiError {
    /// Worth another attempt? Only transport hiccups and 5xx/429/408 are.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RequestFailed(_) => true,
            ApiError::NetworkError(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
