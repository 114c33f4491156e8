// Offline layer for Daily Stories: the caching worker, push handling,
// saved stories and the bits of session state the CLI host needs
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod models;
pub mod push;
pub mod session;
pub mod worker;

pub use config::Config;
pub use error::Error;
pub use gateway::CacheGateway;
pub use http::{Fetcher, HttpFetcher, Request, Response, ResponseType};
pub use push::{ClickOutcome, Notification, NotificationOptions, NotificationSink, WindowClient, WindowClients};
pub use session::{Session, SessionStore};
pub use worker::{dispatch, OfflineWorker, ServiceWorker, WorkerEvent, WorkerOutcome};

pub type Result<T> = std::result::Result<T, Error>;
