use dailystories_api::ApiError;
use dailystories_cache::CacheError;
use thiserror::Error;

/// Everything the worker host can run into
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("API request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Not logged in. Run `dailystories login` first")]
    NotLoggedIn,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
