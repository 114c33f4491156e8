// Terminal stand-ins for the browser's notification and window APIs
use async_trait::async_trait;
use dailystories_core::{Error, Notification, NotificationSink, Result, WindowClient, WindowClients};
use reqwest::Url;
use tracing::info;

/// Prints notifications to stdout
pub struct ConsoleNotifier;

#[async_trait]
impl NotificationSink for ConsoleNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        println!("🔔 {}", notification.title);
        println!("   {}", notification.options.body);
        if !notification.options.extra.is_empty() {
            let extra = serde_json::to_string(&notification.options.extra)?;
            println!("   {}", extra);
        }
        Ok(())
    }

    // Nothing stays on screen in a terminal, so closing is just a log line
    async fn close(&self, notification: &Notification) -> Result<()> {
        info!("Closed notification \"{}\"", notification.title);
        Ok(())
    }
}

/// A terminal has no app windows of its own; "opening" one launches the
/// system browser at the app origin.
pub struct BrowserClients {
    origin: Url,
}

impl BrowserClients {
    pub fn new(origin: Url) -> Self {
        Self { origin }
    }
}

#[async_trait]
impl WindowClients for BrowserClients {
    async fn match_all(&self) -> Result<Vec<WindowClient>> {
        Ok(Vec::new())
    }

    async fn focus(&self, client: &WindowClient) -> Result<()> {
        self.open_window(&client.url).await
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        let target = self.origin.join(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        info!("Opening {}", target);
        open::that(target.as_str())
            .map_err(|e| Error::Notification(format!("Failed to open browser: {}", e)))
    }
}
