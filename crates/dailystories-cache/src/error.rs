use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Storage-layer failures
///
/// These never leave the bookmark store (it converts them to bools and empty
/// results); the response cache hands them up to the gateway, which decides
/// whether they matter.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Database version {found} is newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },
}
