use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::push::PushSubscription;
use crate::retry::{is_retryable_status, with_retry, RetryConfig};

pub const DEFAULT_API_BASE: &str = "https://story-api.dicoding.dev/v1";

/// A story as the API returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

/// Paging and filtering for the story feed
#[derive(Debug, Clone, Default)]
pub struct StoryQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// Only stories that carry coordinates
    pub with_location: bool,
}

impl StoryQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            params.push(("size", size.to_string()));
        }
        params.push(("location", if self.with_location { "1" } else { "0" }.to_string()));
        params
    }
}

/// Story upload: a description, a photo and optional coordinates
#[derive(Debug, Clone)]
pub struct NewStory {
    pub description: String,
    pub photo: Vec<u8>,
    pub file_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl NewStory {
    fn photo_mime(&self) -> &'static str {
        let lower = self.file_name.to_ascii_lowercase();
        if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".gif") {
            "image/gif"
        } else if lower.ends_with(".webp") {
            "image/webp"
        } else {
            "image/jpeg"
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    error: bool,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    error: bool,
    message: String,
    login_result: Option<LoginResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoriesResponse {
    error: bool,
    message: String,
    #[serde(default)]
    list_story: Vec<Story>,
}

#[derive(Debug, Deserialize)]
struct StoryResponse {
    error: bool,
    message: String,
    story: Option<Story>,
}

fn check(error: bool, message: &str) -> Result<()> {
    if error {
        Err(ApiError::Rejected(message.to_string()))
    } else {
        Ok(())
    }
}

/// Turn a raw response into `T`, mapping auth and transient statuses first.
///
/// The API answers most client errors with a JSON envelope carrying
/// `error: true`, so a non-2xx body is still parsed when it can be.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::AuthRequired);
    }

    let body = response.text().await?;

    if is_retryable_status(status) {
        return Err(ApiError::RequestFailed(format!("Status {}: {}", status, body)));
    }

    match serde_json::from_str(&body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => {
            Err(ApiError::RequestFailed(format!("Status {}: {}", status, body)))
        }
        Err(e) => Err(e.into()),
    }
}

pub struct StoryClient {
    client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl StoryClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("DailyStories/0.1.0"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let url = format!("{}/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "name": name,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        let parsed: MessageResponse = read_json(response).await?;
        check(parsed.error, &parsed.message)?;
        info!("Registered {}", email);
        Ok(parsed.message)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult> {
        let url = format!("{}/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        let parsed: LoginResponse = read_json(response).await?;
        check(parsed.error, &parsed.message)?;
        parsed
            .login_result
            .ok_or_else(|| ApiError::RequestFailed("Login response had no loginResult".into()))
    }

    /// Fetch the story feed
    pub async fn list_stories(&self, token: &str, query: &StoryQuery) -> Result<Vec<Story>> {
        let url = format!("{}/stories", self.base_url);
        let params = query.to_params();

        with_retry(
            &self.retry_config,
            || async {
                let response = self
                    .client
                    .get(&url)
                    .bearer_auth(token)
                    .query(&params)
                    .send()
                    .await?;

                let parsed: StoriesResponse = read_json(response).await?;
                check(parsed.error, &parsed.message)?;
                debug!("Fetched {} stories", parsed.list_story.len());
                Ok::<_, ApiError>(parsed.list_story)
            },
            ApiError::is_retryable,
        )
        .await
    }

    pub async fn get_story(&self, token: &str, id: &str) -> Result<Story> {
        let url = format!("{}/stories/{}", self.base_url, urlencoding::encode(id));

        with_retry(
            &self.retry_config,
            || async {
                let response = self.client.get(&url).bearer_auth(token).send().await?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(ApiError::NotFound(id.to_string()));
                }

                let parsed: StoryResponse = read_json(response).await?;
                check(parsed.error, &parsed.message)?;
                parsed.story.ok_or_else(|| ApiError::NotFound(id.to_string()))
            },
            ApiError::is_retryable,
        )
        .await
    }

    /// Upload a new story. Not retried: a replay could post it twice.
    pub async fn add_story(&self, token: &str, story: NewStory) -> Result<String> {
        let url = format!("{}/stories", self.base_url);
        let mime = story.photo_mime();

        let photo = reqwest::multipart::Part::bytes(story.photo)
            .file_name(story.file_name)
            .mime_str(mime)?;

        let mut form = reqwest::multipart::Form::new()
            .text("description", story.description)
            .part("photo", photo);

        if let (Some(lat), Some(lon)) = (story.lat, story.lon) {
            form = form.text("lat", lat.to_string()).text("lon", lon.to_string());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let parsed: MessageResponse = read_json(response).await?;
        check(parsed.error, &parsed.message)?;
        Ok(parsed.message)
    }

    /// Register a push subscription with the server
    pub async fn subscribe_push(&self, token: &str, subscription: &PushSubscription) -> Result<String> {
        let url = format!("{}/notifications/subscribe", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(subscription)
            .send()
            .await?;

        let parsed: MessageResponse = read_json(response).await?;
        check(parsed.error, &parsed.message)?;
        info!("Push subscription registered for {}", subscription.endpoint);
        Ok(parsed.message)
    }

    pub async fn unsubscribe_push(&self, token: &str, endpoint: &str) -> Result<String> {
        let url = format!("{}/notifications/subscribe", self.base_url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "endpoint": endpoint }))
            .send()
            .await?;

        let parsed: MessageResponse = read_json(response).await?;
        check(parsed.error, &parsed.message)?;
        Ok(parsed.message)
    }
}

impl Default for StoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_feed_deserializes() {
        let body = r#"{
            "error": false,
            "message": "Stories fetched successfully",
            "listStory": [
                {
                    "id": "story-FvU4u0Vp2S3PMsFg",
                    "name": "Dimas",
                    "description": "Lorem Ipsum",
                    "photoUrl": "https://story-api.dicoding.dev/images/stories/photos-1641623658595_dummy-pic.png",
                    "createdAt": "2022-01-08T06:34:18.598Z",
                    "lat": -10.212,
                    "lon": -16.002
                },
                {
                    "id": "story-2",
                    "name": "Ana",
                    "description": "No location",
                    "photoUrl": "https://example.com/p.jpg",
                    "createdAt": "2022-01-09T00:00:00Z",
                    "lat": null,
                    "lon": null
                }
            ]
        }"#;

        let parsed: StoriesResponse = serde_json::from_str(body).unwrap();
        assert!(!parsed.error);
        assert_eq!(parsed.list_story.len(), 2);
        assert_eq!(parsed.list_story[0].lat, Some(-10.212));
        assert_eq!(parsed.list_story[1].lon, None);
        assert_eq!(
            parsed.list_story[0].created_at.to_rfc3339(),
            "2022-01-08T06:34:18.598+00:00"
        );
    }

    #[test]
    fn test_error_envelope_is_rejected() {
        let body = r#"{"error": true, "message": "\"email\" must be a valid email"}"#;
        let parsed: MessageResponse = serde_json::from_str(body).unwrap();

        let result = check(parsed.error, &parsed.message);
        assert!(matches!(result, Err(ApiError::Rejected(m)) if m.contains("valid email")));
    }

    #[test]
    fn test_login_result_deserializes() {
        let body = r#"{
            "error": false,
            "message": "success",
            "loginResult": {"userId": "user-1", "name": "Arif", "token": "abc.def"}
        }"#;
        let parsed: LoginResponse = serde_json::from_str(body).unwrap();
        let login = parsed.login_result.unwrap();
        assert_eq!(login.user_id, "user-1");
        assert_eq!(login.token, "abc.def");
    }

    #[test]
    fn test_query_params() {
        let query = StoryQuery {
            page: Some(2),
            size: None,
            with_location: true,
        };
        assert_eq!(
            query.to_params(),
            vec![("page", "2".to_string()), ("location", "1".to_string())]
        );
        assert_eq!(StoryQuery::default().to_params(), vec![("location", "0".to_string())]);
    }

    #[test]
    fn test_photo_mime_from_extension() {
        let mut story = NewStory {
            description: "d".into(),
            photo: vec![],
            file_name: "beach.PNG".into(),
            lat: None,
            lon: None,
        };
        assert_eq!(story.photo_mime(), "image/png");
        story.file_name = "beach.jpeg".into();
        assert_eq!(story.photo_mime(), "image/jpeg");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = StoryClient::with_base_url("http://localhost:3000/v1/".into());
        assert_eq!(client.base_url(), "http://localhost:3000/v1");
    }
}
