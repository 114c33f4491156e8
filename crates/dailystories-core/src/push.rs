// Push payloads, notifications and what happens when one is clicked
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::NotificationDefaults;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Anything else the sender put in `options` (tag, data, actions, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

impl Notification {
    pub fn from_defaults(defaults: &NotificationDefaults) -> Self {
        Self {
            title: defaults.title.clone(),
            options: NotificationOptions {
                body: defaults.body.clone(),
                icon: defaults.icon.clone(),
                badge: defaults.badge.clone(),
                extra: Map::new(),
            },
        }
    }

    /// Build the notification for a push message.
    ///
    /// Accepted payload: `{ title?, message?, options?: { body?, ... } }`.
    /// `options.body` beats `message`; other `options` keys override the
    /// defaults. Missing data, bad JSON, empty strings or fields of the wrong
    /// type leave defaults in place.
    pub fn from_push(data: Option<&[u8]>, defaults: &NotificationDefaults) -> Self {
        let mut notification = Self::from_defaults(defaults);

        let data = match data {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return notification,
        };

        let payload: Value = match serde_json::from_slice(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Error parsing push data: {}", e);
                return notification;
            }
        };

        // Each field is read on its own so a single badly typed one (say a
        // numeric title) doesn't throw the rest of the message away
        if let Some(title) = text_field(&payload, "title") {
            notification.title = title.to_string();
        }
        if let Some(message) = text_field(&payload, "message") {
            notification.options.body = message.to_string();
        }

        let options = match payload.get("options") {
            Some(Value::Object(options)) => options.clone(),
            Some(other) => {
                debug!("Ignoring non-object push options: {}", other);
                Map::new()
            }
            None => Map::new(),
        };

        for (key, value) in options {
            let slot = match key.as_str() {
                "body" => Some(&mut notification.options.body),
                "icon" => Some(&mut notification.options.icon),
                "badge" => Some(&mut notification.options.badge),
                _ => None,
            };
            match slot {
                Some(slot) => {
                    if let Some(text) = value.as_str().filter(|s| !s.is_empty()) {
                        *slot = text.to_string();
                    }
                }
                None => {
                    notification.options.extra.insert(key, value);
                }
            }
        }

        notification
    }
}

/// A non-empty string at `key`, if the payload is an object that has one
fn text_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Somewhere notifications can be shown
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;
    /// Dismiss a notification the user has acted on
    async fn close(&self, notification: &Notification) -> Result<()>;
}

/// An open app window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

/// The windows the worker can see and steer
#[async_trait]
pub trait WindowClients: Send + Sync {
    async fn match_all(&self) -> Result<Vec<WindowClient>>;
    async fn focus(&self, client: &WindowClient) -> Result<()>;
    async fn open_window(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(WindowClient),
    Opened(String),
}

/// Close the clicked notification, then focus the first window whose URL
/// contains `url_match`, or open `open_url` when there is none
pub async fn handle_notification_click(
    notifier: &dyn NotificationSink,
    notification: &Notification,
    clients: &dyn WindowClients,
    url_match: &str,
    open_url: &str,
) -> Result<ClickOutcome> {
    notifier.close(notification).await?;

    let windows = clients.match_all().await?;

    if let Some(window) = windows.into_iter().find(|w| w.url.contains(url_match)) {
        debug!("Focusing window {} ({})", window.id, window.url);
        clients.focus(&window).await?;
        return Ok(ClickOutcome::Focused(window));
    }

    debug!("No matching window, opening {}", open_url);
    clients.open_window(open_url).await?;
    Ok(ClickOutcome::Opened(open_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn defaults() -> NotificationDefaults {
        NotificationDefaults::default()
    }

    fn push(data: &[u8]) -> Notification {
        Notification::from_push(Some(data), &defaults())
    }

    #[test]
    fn test_title_and_options_body() {
        let n = push(br#"{"title":"T","options":{"body":"B"}}"#);
        assert_eq!(n.title, "T");
        assert_eq!(n.options.body, "B");
        assert_eq!(n.options.icon, "/favicon.png");
    }

    #[test]
    fn test_no_data_gives_defaults() {
        let n = Notification::from_push(None, &defaults());
        assert_eq!(n.title, "Daily Stories App");
        assert_eq!(n.options.body, "New Story Alert!");

        assert_eq!(push(b""), n);
    }

    #[test]
    fn test_message_variant() {
        let n = push(br#"{"title":"New story","message":"Ana posted"}"#);
        assert_eq!(n.title, "New story");
        assert_eq!(n.options.body, "Ana posted");
    }

    #[test]
    fn test_options_body_wins_over_message() {
        let n = push(br#"{"message":"from message","options":{"body":"from options"}}"#);
        assert_eq!(n.options.body, "from options");
        assert_eq!(n.title, "Daily Stories App");
    }

    #[test]
    fn test_malformed_payload_gives_defaults() {
        let n = push(b"New story!");
        assert_eq!(n, Notification::from_defaults(&defaults()));

        let n = push(b"[1, 2, 3]");
        assert_eq!(n, Notification::from_defaults(&defaults()));
    }

    #[test]
    fn test_extra_options_are_kept() {
        let n = push(br#"{"options":{"icon":"/icon-192.png","tag":"story-1","body":""}}"#);
        assert_eq!(n.options.icon, "/icon-192.png");
        assert_eq!(n.options.body, "New Story Alert!");
        assert_eq!(n.options.extra.get("tag"), Some(&Value::from("story-1")));
    }

    #[test]
    fn test_badly_typed_field_keeps_the_rest() {
        let n = push(br#"{"title":"T","options":"x"}"#);
        assert_eq!(n.title, "T");
        assert_eq!(n.options.body, "New Story Alert!");
        assert!(n.options.extra.is_empty());

        let n = push(br#"{"title":5,"message":"m"}"#);
        assert_eq!(n.title, "Daily Stories App");
        assert_eq!(n.options.body, "m");

        let n = push(br#"{"message":"m","options":{"body":7,"icon":"/i.png"}}"#);
        assert_eq!(n.options.body, "m");
        assert_eq!(n.options.icon, "/i.png");
    }

    /// Records every call so tests can check the order of close/focus/open
    struct FakeHost {
        windows: Vec<WindowClient>,
        log: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn new(windows: Vec<WindowClient>) -> Self {
            Self {
                windows,
                log: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationSink for FakeHost {
        async fn show(&self, notification: &Notification) -> Result<()> {
            self.log.lock().unwrap().push(format!("show {}", notification.title));
            Ok(())
        }

        async fn close(&self, notification: &Notification) -> Result<()> {
            self.log.lock().unwrap().push(format!("close {}", notification.title));
            Ok(())
        }
    }

    #[async_trait]
    impl WindowClients for FakeHost {
        async fn match_all(&self) -> Result<Vec<WindowClient>> {
            Ok(self.windows.clone())
        }

        async fn focus(&self, client: &WindowClient) -> Result<()> {
            self.log.lock().unwrap().push(format!("focus {}", client.id));
            Ok(())
        }

        async fn open_window(&self, url: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("open {}", url));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_click_closes_then_focuses_matching_window() {
        let host = FakeHost::new(vec![
            WindowClient {
                id: "w1".into(),
                url: "https://example.com/other".into(),
            },
            WindowClient {
                id: "w2".into(),
                url: "https://example.com/daily-stories-app/#/saved".into(),
            },
        ]);
        let clicked = Notification::from_defaults(&defaults());

        let outcome = handle_notification_click(&host, &clicked, &host, "/daily-stories-app", "/")
            .await
            .unwrap();

        assert!(matches!(outcome, ClickOutcome::Focused(ref w) if w.id == "w2"));
        assert_eq!(
            *host.log.lock().unwrap(),
            vec!["close Daily Stories App".to_string(), "focus w2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_click_closes_then_opens_root_without_matching_window() {
        let host = FakeHost::new(vec![]);
        let clicked = push(br#"{"title":"New story"}"#);

        let outcome = handle_notification_click(&host, &clicked, &host, "/daily-stories-app", "/")
            .await
            .unwrap();

        assert_eq!(outcome, ClickOutcome::Opened("/".to_string()));
        assert_eq!(
            *host.log.lock().unwrap(),
            vec!["close New story".to_string(), "open /".to_string()]
        );
    }
}
