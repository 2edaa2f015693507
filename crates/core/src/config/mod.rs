//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WAYSTATION_*)
//! 2. TOML config file (if WAYSTATION_CONFIG_FILE set)
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

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WAYSTATION_*)
/// 2. TOML config file (if WAYSTATION_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// List values given through the environment use TOML array syntax,
/// e.g. `WAYSTATION_REMOTE_HOSTS='["^cdn\\.example\\.com$"]'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via WAYSTATION_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin that relative manifest paths and request paths resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to accept per response body.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Overall HTTP client timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Upper bound on a network attempt before falling back to the cache.
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Name of the partition holding install-time shell assets.
    #[serde(default = "default_static_cache")]
    pub static_cache: String,

    /// Name of the partition filled opportunistically at runtime.
    #[serde(default = "default_dynamic_cache")]
    pub dynamic_cache: String,

    /// Path prefix of immutable build assets.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Path prefix of same-origin API calls that are never cached.
    #[serde(default = "default_internal_api_prefix")]
    pub internal_api_prefix: String,

    /// Host patterns (regular expressions) for remote APIs and image CDNs
    /// whose responses are cached opportunistically.
    #[serde(default = "default_remote_hosts")]
    pub remote_hosts: Vec<String>,

    /// Paths fetched and stored in the static partition at install time.
    #[serde(default = "default_install_manifest")]
    pub install_manifest: Vec<String>,

    /// Document served to HTML navigations when both network and cache miss.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Optional cap on dynamic partition size; oldest entries are evicted first.
    #[serde(default)]
    pub dynamic_max_entries: Option<usize>,

    /// Background sync tag that triggers a replay of pending actions.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Attempts before a pending action is dead-lettered.
    #[serde(default = "default_replay_max_attempts")]
    pub replay_max_attempts: u32,

    /// Delay before the first retry of a failed replay, doubled on each attempt.
    #[serde(default = "default_replay_backoff_ms")]
    pub replay_backoff_ms: u64,

    /// Ceiling for the replay backoff.
    #[serde(default = "default_replay_max_backoff_ms")]
    pub replay_max_backoff_ms: u64,

    /// Icon shown on push notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Badge shown on push notifications.
    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./waystation-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_user_agent() -> String {
    "waystation/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_network_timeout_ms() -> u64 {
    5_000
}

fn default_static_cache() -> String {
    "static-v1".into()
}

fn default_dynamic_cache() -> String {
    "dynamic-v1".into()
}

fn default_static_prefix() -> String {
    "/_next/static/".into()
}

fn default_internal_api_prefix() -> String {
    "/api/".into()
}

fn default_remote_hosts() -> Vec<String> {
    vec![
        r"^firestore\.googleapis\.com$".into(),
        r"^firebasestorage\.googleapis\.com$".into(),
        r"^images\.unsplash\.com$".into(),
    ]
}

fn default_install_manifest() -> Vec<String> {
    vec![
        "/".into(),
        "/manifest.json".into(),
        "/icons/icon-192x192.png".into(),
        "/icons/icon-512x512.png".into(),
    ]
}

fn default_offline_path() -> String {
    "/offline.html".into()
}

fn default_sync_tag() -> String {
    "sync-actions".into()
}

fn default_replay_max_attempts() -> u32 {
    5
}

fn default_replay_backoff_ms() -> u64 {
    30_000
}

fn default_replay_max_backoff_ms() -> u64 {
    3_600_000
}

fn default_notification_icon() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/icons/icon-72x72.png".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            network_timeout_ms: default_network_timeout_ms(),
            static_cache: default_static_cache(),
            dynamic_cache: default_dynamic_cache(),
            static_prefix: default_static_prefix(),
            internal_api_prefix: default_internal_api_prefix(),
            remote_hosts: default_remote_hosts(),
            install_manifest: default_install_manifest(),
            offline_path: default_offline_path(),
            dynamic_max_entries: None,
            sync_tag: default_sync_tag(),
            replay_max_attempts: default_replay_max_attempts(),
            replay_backoff_ms: default_replay_backoff_ms(),
            replay_max_backoff_ms: default_replay_max_backoff_ms(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Bound applied to each network attempt made by a caching strategy.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    /// Partitions that survive activation.
    pub fn keep_list(&self) -> [&str; 2] {
        [self.static_cache.as_str(), self.dynamic_cache.as_str()]
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WAYSTATION_`
    /// 2. TOML file from `WAYSTATION_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WAYSTATION_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WAYSTATION_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
