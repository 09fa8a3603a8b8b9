//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (KEEPSAKE_*)
//! 2. TOML config file (if KEEPSAKE_CONFIG_FILE set)
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

/// Pre-cached assets of the invitation page.
const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "./Videos/engagement.mp4",
    "./Photos/01.jpg",
    "./Photos/02.jpg",
    "./Photos/03.jpg",
    "./Photos/04.jpg",
    "./Photos/05.jpg",
    "./Photos/06.jpg",
    "./Photos/07.jpg",
    "./Photos/08.jpg",
    "./Photos/09.jpg",
    "./Photos/10.jpg",
    "./Photos/11.jpg",
    "./Photos/Ashish_001.jpg",
    "./Photos/Ashish_002.jpg",
    "./Photos/Ashish_003.jpg",
    "https://fonts.googleapis.com/css2?family=Poppins:wght@300;400;600&family=Great+Vibes&display=swap",
    "https://i.ibb.co/7QpKsCX/heart.png",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (KEEPSAKE_*)
/// 2. TOML config file (if KEEPSAKE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache generation (the version tag).
    ///
    /// Bumping it is the only way to invalidate cached assets.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Asset manifest, pre-cached at install.
    ///
    /// Entries are absolute URLs or paths relative to `origin`.
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    /// Origin the page is served from.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path substrings that mark heavy media (served cache-first).
    #[serde(default = "default_media_markers")]
    pub media_markers: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via KEEPSAKE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keep the cache in process memory instead of SQLite.
    #[serde(default)]
    pub in_memory: bool,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_cache_name() -> String {
    "wedding-invitation-cache-v1".into()
}

fn default_assets() -> Vec<String> {
    DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_media_markers() -> Vec<String> {
    vec!["/Videos/".into(), "/Photos/".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./keepsake-cache.sqlite")
}

fn default_user_agent() -> String {
    "keepsake/0.1".into()
}

fn default_max_bytes() -> usize {
    52_428_800 // 50MB, the engagement video
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            assets: default_assets(),
            origin: default_origin(),
            media_markers: default_media_markers(),
            db_path: default_db_path(),
            in_memory: false,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed page origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        crate::url::canonicalize(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Asset manifest resolved against the origin, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first entry that does not
    /// resolve to an http(s) URL.
    pub fn manifest(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.assets
            .iter()
            .map(|entry| {
                crate::url::resolve(&origin, entry)
                    .map_err(|e| ConfigError::Invalid { field: "assets".into(), reason: format!("{entry}: {e}") })
            })
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `KEEPSAKE_`
    /// 2. TOML file from `KEEPSAKE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("KEEPSAKE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("KEEPSAKE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name, "wedding-invitation-cache-v1");
        assert_eq!(config.assets.len(), 19);
        assert_eq!(config.media_markers, vec!["/Videos/", "/Photos/"]);
        assert_eq!(config.db_path, PathBuf::from("./keepsake-cache.sqlite"));
        assert_eq!(config.user_agent, "keepsake/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert!(!config.in_memory);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_manifest_resolves_relative_entries() {
        let config = AppConfig { origin: "https://invite.example/".into(), ..Default::default() };
        let manifest = config.manifest().unwrap();

        assert_eq!(manifest[0].as_str(), "https://invite.example/");
        assert_eq!(manifest[1].as_str(), "https://invite.example/index.html");
        assert_eq!(manifest[2].as_str(), "https://invite.example/Videos/engagement.mp4");
        assert_eq!(manifest[18].as_str(), "https://i.ibb.co/7QpKsCX/heart.png");
    }

    #[test]
    fn test_manifest_rejects_bad_entry() {
        let config = AppConfig { assets: vec!["ftp://files.example/a.jpg".into()], ..Default::default() };
        let result = config.manifest();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "assets"));
    }

    #[test]
    fn test_origin_url_invalid() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(config.origin_url().is_err());
    }
}
