//! Agent configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DOCSCAN_*)
//! 2. TOML config file (if DOCSCAN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bypass::{BypassRules, DEFAULT_EXCLUDED_HOSTS, HostMatch};
use crate::manifest::{DEFAULT_PRECACHE_URLS, PrecacheManifest};
use crate::origin::{parse_origin, resolve};

mod validation;

pub use validation::ConfigError;

/// Agent configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DOCSCAN_*)
/// 2. TOML config file (if DOCSCAN_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// List values are given in TOML array syntax when set through the
/// environment, e.g. `DOCSCAN_EXCLUDED_HOSTS='["google.com"]'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name of the current cache generation.
    ///
    /// Bump on every release that changes cached assets.
    /// Set via DOCSCAN_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin the application is served from; relative manifest entries
    /// resolve against it.
    ///
    /// Set via DOCSCAN_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// URLs stored at install time.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Hosts whose requests are never intercepted.
    #[serde(default = "default_excluded_hosts")]
    pub excluded_hosts: Vec<String>,

    /// How `excluded_hosts` entries are matched.
    ///
    /// Set via DOCSCAN_HOST_MATCH (`substring` or `domain`).
    #[serde(default)]
    pub host_match: HostMatch,

    /// Document served for navigations that fail on the network.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Path to the SQLite cache database. Unset keeps the cache in memory.
    ///
    /// Set via DOCSCAN_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network timeout in milliseconds. Unset leaves the platform default.
    ///
    /// The stdio host answers events one at a time, so a request that never
    /// completes holds up every later event. Hosts that cannot rule that out
    /// should set this (e.g. `DOCSCAN_TIMEOUT_MS=30000`).
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Maximum response body size accepted from the network.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_version() -> String {
    "docscan-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_precache_urls() -> Vec<String> {
    DEFAULT_PRECACHE_URLS.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_hosts() -> Vec<String> {
    DEFAULT_EXCLUDED_HOSTS.iter().map(|s| s.to_string()).collect()
}

fn default_offline_fallback() -> String {
    "/index.html".into()
}

fn default_user_agent() -> String {
    "docscan-agent/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            origin: default_origin(),
            precache_urls: default_precache_urls(),
            excluded_hosts: default_excluded_hosts(),
            host_match: HostMatch::default(),
            offline_fallback: default_offline_fallback(),
            db_path: None,
            user_agent: default_user_agent(),
            timeout_ms: None,
            max_bytes: default_max_bytes(),
        }
    }
}

impl AgentConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// The parsed application origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        parse_origin(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// The precache manifest resolved against the origin.
    pub fn manifest(&self) -> Result<PrecacheManifest, ConfigError> {
        PrecacheManifest::resolve(&self.origin_url()?, self.precache_urls.as_slice())
            .map_err(|e| ConfigError::Invalid { field: "precache_urls".into(), reason: e.to_string() })
    }

    /// Absolute URL of the offline fallback document.
    pub fn offline_fallback_url(&self) -> Result<Url, ConfigError> {
        resolve(&self.origin_url()?, &self.offline_fallback)
            .map_err(|e| ConfigError::Invalid { field: "offline_fallback".into(), reason: e.to_string() })
    }

    pub fn bypass_rules(&self) -> BypassRules {
        BypassRules::new(&self.excluded_hosts, self.host_match)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DOCSCAN_`
    /// 2. TOML file from `DOCSCAN_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("DOCSCAN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DOCSCAN_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
