// SQLite-backed storage for the offline layer
// Response cache generations for the worker, saved stories for the reader

pub mod bookmarks;
pub mod error;
pub mod responses;

pub use bookmarks::{BookmarkStore, SavedStory};
pub use error::{CacheError, Result};
pub use responses::{CacheStorage, CachedResponse};
