//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CELI_*)
//! 2. TOML config file (if CELI_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Cache generation shipped with this build.
///
/// Bump it on every deployment that changes the asset set; activation
/// deletes every bucket with a different name.
pub const DEFAULT_CACHE_NAME: &str = "celi-cache-v1";

/// Body of the synthesized response for API and navigation requests that
/// cannot reach the network.
pub const DEFAULT_OFFLINE_MESSAGE: &str = "You are offline. Please check your internet connection.";

/// Assets eagerly cached at install time, in fetch order.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/static/manifest.json",
    "/static/css/style.css",
    "/static/css/dashboard.css",
    "/static/js/core.js",
    "/static/js/dashboard.js",
    "/static/js/calendar.js",
    "/static/js/profile.js",
    "https://cdn.jsdelivr.net/npm/chart.js",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CELI_*)
/// 2. TOML config file (if CELI_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via CELI_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the current cache generation.
    ///
    /// Set via CELI_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin of the journaling backend; responses from it are "basic".
    ///
    /// Set via CELI_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Socket address the proxy listens on.
    ///
    /// Set via CELI_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// URLs cached at install. Relative entries resolve against `origin`.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Path fragments that mark a request as an API call.
    #[serde(default = "default_api_markers")]
    pub api_markers: Vec<String>,

    /// Plain-text body served when an API or navigation request is offline.
    ///
    /// Set via CELI_OFFLINE_MESSAGE environment variable.
    #[serde(default = "default_offline_message")]
    pub offline_message: String,

    /// Route the page is sent to when the backend reports a guest session.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// User-Agent string for upstream requests.
    ///
    /// Set via CELI_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to accept per upstream response.
    ///
    /// Set via CELI_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via CELI_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./celi-cache.sqlite")
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.into()
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_api_markers() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_offline_message() -> String {
    DEFAULT_OFFLINE_MESSAGE.into()
}

fn default_login_path() -> String {
    "/login".into()
}

fn default_user_agent() -> String {
    "celi/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_name: default_cache_name(),
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            manifest: default_manifest(),
            api_markers: default_api_markers(),
            offline_message: default_offline_message(),
            login_path: default_login_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed backend origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CELI_`
    /// 2. TOML file from `CELI_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CELI_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("CELI_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
