// Cache-first gateway between the page and the network
use dailystories_cache::CacheStorage;
use futures::future::join_all;
use reqwest::{Method, Url};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::http::{Fetcher, Request, Response, ResponseType};
use crate::{Error, Result};

/// Serves requests out of the current cache generation, falling back to the
/// network and remembering what came back.
///
/// The generation name is the only invalidation lever: there is no TTL and no
/// freshness check, stale hits are returned as-is. Bumping the name and
/// running [`activate`](Self::activate) throws every older generation away.
pub struct CacheGateway {
    cache_name: String,
    origin: Url,
    manifest: Vec<String>,
    storage: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheGateway {
    pub fn new(
        config: &WorkerConfig,
        storage: Arc<CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl {
            url: config.origin.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            cache_name: config.cache_name.clone(),
            origin,
            manifest: config.manifest.clone(),
            storage,
            fetcher,
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Absolute URL for `url`; paths are taken relative to the app origin
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.origin.join(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Cache key: method plus absolute URL.
    ///
    /// The fragment is dropped before keying. The app routes with `#/...`
    /// hashes, so `/#/saved` has to land on the same entry as `/` or every
    /// offline navigation would miss the cached shell.
    pub fn request_key(method: &Method, url: &Url) -> String {
        let mut key_url = url.clone();
        key_url.set_fragment(None);
        format!("{} {}", method, key_url)
    }

    /// Pre-fetch the manifest into the current generation.
    ///
    /// All or nothing: if any URL fails to fetch or answers with a non-2xx
    /// status, nothing is written and the generation is not created.
    pub async fn install(&self) -> Result<usize> {
        info!(
            "Installing {} ({} manifest entries)",
            self.cache_name,
            self.manifest.len()
        );

        let requests = self
            .manifest
            .iter()
            .map(|url| self.resolve(url).map(|u| Request::get(u.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            let response = result
                .map_err(|e| Error::InstallFailed(format!("{}: {}", request.url, e)))?;

            if !response.is_ok() {
                return Err(Error::InstallFailed(format!(
                    "{} returned status {}",
                    request.url, response.status
                )));
            }

            let url = self.resolve(&request.url)?;
            entries.push((Self::request_key(&request.method, &url), response.to_cached()));
        }

        self.storage.put_all(&self.cache_name, &entries)?;
        Ok(entries.len())
    }

    /// Delete every generation except the current one.
    /// Returns the names that were removed.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();

        for name in self.storage.keys()? {
            if name == self.cache_name {
                continue;
            }
            if self.storage.delete(&name)? {
                info!("Deleted stale cache generation {}", name);
                deleted.push(name);
            }
        }

        Ok(deleted)
    }

    /// Cache first, network second.
    ///
    /// A network failure on a miss comes back as `Err`; a non-cacheable
    /// response is passed through untouched. Failing to store a fresh
    /// response only gets logged.
    pub async fn intercept(&self, request: Request) -> Result<Response> {
        let url = self.resolve(&request.url)?;
        let request = Request {
            url: url.to_string(),
            ..request
        };

        if request.method != Method::GET {
            debug!("{} {} bypasses the cache", request.method, request.url);
            return self.fetcher.fetch(&request).await;
        }

        let key = Self::request_key(&request.method, &url);

        match self.storage.match_request(&self.cache_name, &key) {
            Ok(Some(cached)) => {
                debug!("Cache hit: {}", key);
                let kind = ResponseType::classify(&self.origin, &cached.url);
                return Ok(Response::from_cached(cached, kind));
            }
            Ok(None) => debug!("Cache miss: {}", key),
            Err(e) => warn!("Cache lookup failed for {}: {}", key, e),
        }

        let response = self.fetcher.fetch(&request).await?;

        if response.is_cacheable() {
            if let Err(e) = self.storage.put(&self.cache_name, &key, &response.to_cached()) {
                warn!("Failed to cache {}: {}", key, e);
            }
        }

        Ok(response)
    }
}
