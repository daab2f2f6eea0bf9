//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PICTOH_*)
//! 2. TOML config file (if PICTOH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheNames;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PICTOH_*)
/// 2. TOML config file (if PICTOH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via PICTOH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the agent serves; only requests to this origin are intercepted.
    ///
    /// Set via PICTOH_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Namespace token prefixed to every cache name.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Version suffix of every cache name. Bumping it retires the old caches
    /// on the next activation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Entry cap of the built-in image cache.
    #[serde(default = "default_built_in_image_max_entries")]
    pub built_in_image_max_entries: usize,

    /// Entry cap of the user-added image cache.
    #[serde(default = "default_user_image_max_entries")]
    pub user_image_max_entries: usize,

    /// Age after which a cached image is refetched.
    #[serde(default = "default_image_max_age_days")]
    pub image_max_age_days: u32,

    /// Build-time asset manifest installed into the precache.
    ///
    /// Set via PICTOH_PRECACHE_MANIFEST environment variable (comma-separated).
    #[serde(default)]
    pub precache_manifest: Vec<String>,

    /// Route uncategorised requests network-first instead of cache-first.
    #[serde(default)]
    pub legacy_network_first: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pictoh-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_namespace() -> String {
    "pictoh".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_user_agent() -> String {
    "pictoh-agent/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    20_971_520 // 20MB, TTS model files are large
}

fn default_max_redirects() -> usize {
    5
}

fn default_built_in_image_max_entries() -> usize {
    200
}

fn default_user_image_max_entries() -> usize {
    50
}

fn default_image_max_age_days() -> u32 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            namespace: default_namespace(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            built_in_image_max_entries: default_built_in_image_max_entries(),
            user_image_max_entries: default_user_image_max_entries(),
            image_max_age_days: default_image_max_age_days(),
            precache_manifest: Vec::new(),
            legacy_network_first: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Maximum image age as a chrono duration.
    pub fn image_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.image_max_age_days))
    }

    /// Parsed origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme: {scheme}") }),
        }
    }

    /// Cache names for the configured namespace and version.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.namespace, &self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PICTOH_`
    /// 2. TOML file from `PICTOH_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("PICTOH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("PICTOH_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Load configuration from an explicit TOML file layered under the
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`].
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.into()))
            .merge(
                Env::prefixed("PICTOH_")
                    .ignore(&["config_file"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            );
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.precache_manifest = split_list(&config.precache_manifest);

        config.validate()?;

        Ok(config)
    }
}

/// Flatten comma-separated entries so `PICTOH_PRECACHE_MANIFEST=a,b` works
/// alongside TOML arrays.
fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pictoh-cache.sqlite"));
        assert_eq!(config.origin, "http://localhost:5173");
        assert_eq!(config.namespace, "pictoh");
        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.user_agent, "pictoh-agent/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.built_in_image_max_entries, 200);
        assert_eq!(config.user_image_max_entries, 50);
        assert_eq!(config.image_max_age_days, 30);
        assert!(config.precache_manifest.is_empty());
        assert!(!config.legacy_network_first);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_image_max_age() {
        let config = AppConfig::default();
        assert_eq!(config.image_max_age(), chrono::Duration::days(30));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:5173/");

        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_cache_names_follow_config() {
        let config = AppConfig { namespace: "demo".into(), cache_version: "v7".into(), ..Default::default() };
        assert_eq!(config.cache_names().shell(), "demo-shell-v7");
    }

    #[test]
    fn test_split_list() {
        let values = vec!["/a.js, /b.css".to_string(), "".to_string(), "/c.woff2".to_string()];
        assert_eq!(split_list(&values), vec!["/a.js", "/b.css", "/c.woff2"]);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "cache_version = \"v3\"\nuser_image_max_entries = 10\nprecache_manifest = [\"/assets/index.js\"]"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.cache_version, "v3");
        assert_eq!(config.user_image_max_entries, 10);
        assert_eq!(config.precache_manifest, vec!["/assets/index.js"]);
        assert_eq!(config.namespace, "pictoh");
    }
}
