// Client for the Daily Stories REST API
pub mod error;
pub mod push;
pub mod retry;
pub mod stories;

pub use error::{ApiError, Result};
pub use push::{PushSubscription, SubscriptionKeys};
pub use retry::RetryConfig;
pub use stories::{LoginResult, NewStory, Story, StoryClient, StoryQuery, DEFAULT_API_BASE};
