use crate::error::{PublisherError, Result};
use crate::{expand_tilde, parse_duration};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "~/.drive_publisher.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_data_source() -> String {
    "Cluster0".to_string()
}

fn default_database() -> String {
    "yt_automation".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: default_token_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    /// Tried in order; the first model that answers wins.
    #[serde(default = "default_gemini_models")]
    pub models: Vec<String>,
    #[serde(default = "default_gemini_base")]
    pub api_base: String,
}

fn default_gemini_models() -> Vec<String> {
    vec!["gemini-2.0-flash".to_string(), "gemini-1.5-flash".to_string()]
}

fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            models: default_gemini_models(),
            api_base: default_gemini_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub remote_store: Option<RemoteStoreConfig>,
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout: String,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default = "default_drive_account")]
    pub drive_account: String,
    #[serde(default = "default_drive_base")]
    pub drive_api_base: String,
    #[serde(default = "default_youtube_base")]
    pub youtube_api_base: String,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default = "default_item_page_size")]
    pub item_page_size: u32,
}

fn default_data_dir() -> String {
    "~/.drive_publisher".to_string()
}

fn default_remote_timeout() -> String {
    "5s".to_string()
}

fn default_drive_account() -> String {
    "drive".to_string()
}

fn default_drive_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_youtube_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_item_page_size() -> u32 {
    100
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote_store: None,
            remote_timeout: default_remote_timeout(),
            google: GoogleConfig::default(),
            drive_account: default_drive_account(),
            drive_api_base: default_drive_base(),
            youtube_api_base: default_youtube_base(),
            gemini: GeminiConfig::default(),
            item_page_size: default_item_page_size(),
        }
    }
}

impl AppConfig {
    /// Loads the JSON config file, then applies environment overrides.
    /// A missing file is not an error.
    pub fn load(config_path: &str) -> Result<Self> {
        let expanded_path = expand_tilde(config_path);
        let mut config = match fs::read_to_string(&expanded_path) {
            Ok(content) => serde_json::from_str::<AppConfig>(&content).map_err(|e| {
                PublisherError::config(format!(
                    "Failed to parse config '{}': {}",
                    expanded_path, e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", expanded_path);
                AppConfig::default()
            }
            Err(e) => {
                return Err(PublisherError::config(format!(
                    "Failed to read config from '{}': {}",
                    expanded_path, e
                )))
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from environment variables; `lookup` abstracts the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("DRIVE_PUBLISHER_DATA_DIR") {
            self.data_dir = dir;
        }
        if let Some(endpoint) = non_empty("MONGO_DATA_API_URL") {
            let store = self.remote_store.get_or_insert_with(|| RemoteStoreConfig {
                data_source: default_data_source(),
                database: default_database(),
                ..RemoteStoreConfig::default()
            });
            store.endpoint = endpoint;
        }
        if let Some(store) = self.remote_store.as_mut() {
            if let Some(key) = non_empty("MONGO_DATA_API_KEY") {
                store.api_key = key;
            }
            if let Some(source) = non_empty("MONGO_DATA_SOURCE") {
                store.data_source = source;
            }
            if let Some(database) = non_empty("MONGO_DATABASE") {
                store.database = database;
            }
        }
        if let Some(id) = non_empty("GOOGLE_CLIENT_ID") {
            self.google.client_id = id;
        }
        if let Some(secret) = non_empty("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = secret;
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.timeout()?;
        if self.item_page_size == 0 {
            return Err(PublisherError::config("item_page_size must be positive"));
        }
        if let Some(store) = &self.remote_store {
            if store.endpoint.trim().is_empty() {
                return Err(PublisherError::config("remote_store.endpoint is empty"));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.remote_timeout).map_err(PublisherError::Config)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.data_dir))
    }
}
