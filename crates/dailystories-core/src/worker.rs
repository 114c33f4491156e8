// Worker lifecycle: one handler per event the host delivers
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{NotificationDefaults, WorkerConfig};
use crate::gateway::CacheGateway;
use crate::http::{Request, Response};
use crate::push::{
    handle_notification_click, ClickOutcome, Notification, NotificationSink, WindowClients,
};
use crate::Result;

/// Event handlers a host calls into. Registered once at startup.
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    /// New version: pre-cache the manifest. Returns how many entries were stored.
    async fn on_install(&self) -> Result<usize>;
    /// Version takeover: returns the stale generations that were dropped.
    async fn on_activate(&self) -> Result<Vec<String>>;
    async fn on_fetch(&self, request: Request) -> Result<Response>;
    async fn on_push(&self, data: Option<Vec<u8>>) -> Result<Notification>;
    async fn on_notification_click(&self, notification: Notification) -> Result<ClickOutcome>;
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(Option<Vec<u8>>),
    /// The user clicked this notification
    NotificationClick(Notification),
}

#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Installed(usize),
    Activated(Vec<String>),
    Responded(Response),
    Shown(Notification),
    Clicked(ClickOutcome),
}

/// Route one event to its handler
pub async fn dispatch(worker: &dyn ServiceWorker, event: WorkerEvent) -> Result<WorkerOutcome> {
    match event {
        WorkerEvent::Install => worker.on_install().await.map(WorkerOutcome::Installed),
        WorkerEvent::Activate => worker.on_activate().await.map(WorkerOutcome::Activated),
        WorkerEvent::Fetch(request) => worker.on_fetch(request).await.map(WorkerOutcome::Responded),
        WorkerEvent::Push(data) => worker.on_push(data).await.map(WorkerOutcome::Shown),
        WorkerEvent::NotificationClick(notification) => worker
            .on_notification_click(notification)
            .await
            .map(WorkerOutcome::Clicked),
    }
}

/// The app's worker: cache gateway plus notifications
pub struct OfflineWorker {
    gateway: CacheGateway,
    notifier: Arc<dyn NotificationSink>,
    clients: Arc<dyn WindowClients>,
    defaults: NotificationDefaults,
    client_url_match: String,
    open_url: String,
}

impl OfflineWorker {
    pub fn new(
        config: &WorkerConfig,
        gateway: CacheGateway,
        notifier: Arc<dyn NotificationSink>,
        clients: Arc<dyn WindowClients>,
    ) -> Self {
        Self {
            gateway,
            notifier,
            clients,
            defaults: config.notification.clone(),
            client_url_match: config.client_url_match.clone(),
            open_url: config.open_url.clone(),
        }
    }

    pub fn gateway(&self) -> &CacheGateway {
        &self.gateway
    }
}

#[async_trait]
impl ServiceWorker for OfflineWorker {
    async fn on_install(&self) -> Result<usize> {
        let stored = self.gateway.install().await.map_err(|e| {
            error!("Install of {} aborted: {}", self.gateway.cache_name(), e);
            e
        })?;
        info!("Installed {} with {} entries", self.gateway.cache_name(), stored);
        Ok(stored)
    }

    async fn on_activate(&self) -> Result<Vec<String>> {
        self.gateway.activate().await
    }

    async fn on_fetch(&self, request: Request) -> Result<Response> {
        self.gateway.intercept(request).await
    }

    async fn on_push(&self, data: Option<Vec<u8>>) -> Result<Notification> {
        let notification = Notification::from_push(data.as_deref(), &self.defaults);
        self.notifier.show(&notification).await?;
        Ok(notification)
    }

    async fn on_notification_click(&self, notification: Notification) -> Result<ClickOutcome> {
        handle_notification_click(
            self.notifier.as_ref(),
            &notification,
            self.clients.as_ref(),
            &self.client_url_match,
            &self.open_url,
        )
        .await
    }
}
