//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from, in order of precedence:
//!
//! 1. Environment variables (SW_CACHE_*)
//! 2. TOML config file (if SW_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

use crate::Error;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite file holding every cache store.
    ///
    /// Set via SW_CACHE_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the site the worker controls. Requests to any other
    /// origin bypass the cache.
    ///
    /// Set via SW_CACHE_ORIGIN.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache store name prefix.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Version tag; bumping it makes the next activation evict older stores.
    ///
    /// Set via SW_CACHE_CACHE_VERSION.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Root-relative paths pre-cached on install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Path substrings served network-first.
    #[serde(default = "default_network_first")]
    pub network_first: Vec<String>,

    /// Path suffixes served cache-first.
    #[serde(default = "default_cache_first")]
    pub cache_first: Vec<String>,

    /// Background-sync tag used for parked form submissions.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// User-Agent string for live fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body bytes accepted from the network.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sw-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_name() -> String {
    "site-cache".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_precache() -> Vec<String> {
    ["/", "/index.html", "/static/js/main.js", "/static/css/main.css", "/manifest.json", "/logo192.png", "/logo512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_network_first() -> Vec<String> {
    vec!["/api/".into(), "/graphql".into()]
}

fn default_cache_first() -> Vec<String> {
    [".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".woff", ".woff2", ".ttf"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sync_tag() -> String {
    "contact-form-sync".into()
}

fn default_user_agent() -> String {
    "sw-cache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_name: default_cache_name(),
            cache_version: default_cache_version(),
            precache: default_precache(),
            network_first: default_network_first(),
            cache_first: default_cache_first(),
            sync_tag: default_sync_tag(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the store for the configured version, e.g. `site-cache-v1`.
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.cache_name, self.cache_version)
    }

    /// The controlled origin as a parsed URL.
    pub fn origin_url(&self) -> Result<Url, Error> {
        Url::parse(&self.origin).map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", self.origin)))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SW_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SW_CACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
