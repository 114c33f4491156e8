use dailystories_api::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Loaded once at startup from `config.toml` and handed to the components
/// that need it. Missing file or missing keys fall back to the defaults, so
/// a config file only has to mention what it actually changes.
/// Priority: `--config` path > `DAILYSTORIES_CONFIG` > platform config dir.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load config from the default location, or defaults if there is none
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        // No file is not an error: first run should just work with defaults
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config_dir>/dailystories/config.toml`
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("dailystories");

        Ok(config_dir.join("config.toml"))
    }

    /// Where the databases and session file live.
    ///
    /// Separate from the config dir: wiping it resets saved stories and the
    /// cache but leaves your settings alone.
    pub fn data_dir(&self) -> crate::Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?
                .join("dailystories")),
        }
    }

    pub fn bookmark_db_path(&self) -> crate::Result<PathBuf> {
        Ok(self
            .data_dir()?
            .join(format!("{}.sqlite", self.storage.database_name)))
    }

    pub fn cache_db_path(&self) -> crate::Result<PathBuf> {
        Ok(self.data_dir()?.join("cache-storage.sqlite"))
    }

    pub fn session_path(&self) -> crate::Result<PathBuf> {
        Ok(self.data_dir()?.join("session.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Current cache generation. Bump it on deploy to invalidate everything.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin the app is served from; decides which responses are same-origin
    #[serde(default = "default_origin")]
    pub origin: String,

    /// URLs fetched and stored at install time
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// An open window whose URL contains this gets focused on notification click
    #[serde(default = "default_client_url_match")]
    pub client_url_match: String,

    /// Opened when no matching window exists
    #[serde(default = "default_open_url")]
    pub open_url: String,

    #[serde(default)]
    pub notification: NotificationDefaults,
}

fn default_cache_name() -> String {
    "daily-stories-v1".to_string()
}

fn default_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/scripts/index.js",
        "/scripts/navigation.js",
        "/styles.css",
        "/leaflet.css",
        "/favicon.png",
        "https://story-api.dicoding.dev/v1/stories",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_client_url_match() -> String {
    "/daily-stories-app".to_string()
}

fn default_open_url() -> String {
    "/".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            origin: default_origin(),
            manifest: default_manifest(),
            client_url_match: default_client_url_match(),
            open_url: default_open_url(),
            notification: NotificationDefaults::default(),
        }
    }
}

/// What a push notification shows when the payload doesn't say otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDefaults {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_icon")]
    pub badge: String,
}

fn default_title() -> String {
    "Daily Stories App".to_string()
}

fn default_body() -> String {
    "New Story Alert!".to_string()
}

fn default_icon() -> String {
    "/favicon.png".to_string()
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            icon: default_icon(),
            badge: default_icon(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the platform data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Saved-stories schema version
    #[serde(default = "default_database_version")]
    pub database_version: u32,
}

fn default_database_name() -> String {
    "daily-stories-db".to_string()
}

fn default_database_version() -> u32 {
    1
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_name: default_database_name(),
            database_version: default_database_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// How many times a failed feed or story fetch is retried. Only reads
    /// are retried; posting twice would publish the story twice.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_url() -> String {
    dailystories_api::DEFAULT_API_BASE.to_string()
}

fn default_max_retries() -> u32 {
    2
}

impl ApiConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::default()
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            max_retries: default_max_retries(),
        }
    }
}
