// Request/response types the worker sees, and the network seam behind them
use async_trait::async_trait;
use dailystories_cache::CachedResponse;
use reqwest::{Method, Url};
use tracing::debug;

use crate::{Error, Result};

/// Outgoing request as intercepted from the page
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Whether a response may be read and stored by the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Same-origin, fully readable
    Basic,
    /// Cross-origin
    Cors,
}

impl ResponseType {
    pub fn classify(origin: &Url, url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) if parsed.origin() == origin.origin() => ResponseType::Basic,
            _ => ResponseType::Cors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub kind: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only a plain 200 from our own origin goes into the cache
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseType::Basic
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse {
            url: self.url.clone(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    pub fn from_cached(cached: CachedResponse, kind: ResponseType) -> Self {
        Self {
            url: cached.url,
            status: cached.status,
            kind,
            headers: cached.headers,
            body: cached.body,
        }
    }
}

/// The network, as far as the worker is concerned
///
/// Non-2xx statuses come back as `Ok`; only transport failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: Url) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("DailyStories/0.1.0"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, origin }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .to_vec();

        debug!("{} {} -> {}", request.method, request.url, status);

        Ok(Response {
            kind: ResponseType::classify(&self.origin, &url),
            url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:5173").unwrap()
    }

    #[test]
    fn test_classify_same_origin() {
        assert_eq!(
            ResponseType::classify(&origin(), "http://localhost:5173/index.html"),
            ResponseType::Basic
        );
    }

    #[test]
    fn test_classify_cross_origin() {
        assert_eq!(
            ResponseType::classify(&origin(), "https://story-api.dicoding.dev/v1/stories"),
            ResponseType::Cors
        );
        // Different port is a different origin
        assert_eq!(
            ResponseType::classify(&origin(), "http://localhost:8080/"),
            ResponseType::Cors
        );
    }

    #[test]
    fn test_cacheable_needs_200_and_basic() {
        let mut response = Response {
            url: "http://localhost:5173/".to_string(),
            status: 200,
            kind: ResponseType::Basic,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: b"<html>".to_vec(),
        };
        assert!(response.is_cacheable());
        assert_eq!(response.header("content-type"), Some("text/html"));

        response.status = 204;
        assert!(response.is_ok());
        assert!(!response.is_cacheable());

        response.status = 200;
        response.kind = ResponseType::Cors;
        assert!(!response.is_cacheable());
    }
}
