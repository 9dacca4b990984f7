//! Engine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCAST_*)
//! 2. TOML config file (if OFFCAST_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The configuration is immutable once the engine is constructed; changing
//! the version tag requires a new deployment, which is what makes generation
//! garbage-collection sound.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::policy::StrategyMap;

mod validation;

pub use validation::ConfigError;

/// Third-party asset hosts treated as static assets by default.
pub const DEFAULT_CDN_HOSTS: &[&str] = &[
    "unpkg.com",
    "cdn.tailwindcss.com",
    "cdnjs.cloudflare.com",
    "fonts.googleapis.com",
    "fonts.gstatic.com",
];

/// Engine configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCAST_*)
/// 2. TOML config file (if OFFCAST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prefix shared by every generation this engine owns. Generations with
    /// other prefixes are never touched during garbage collection.
    #[serde(default = "default_cache_name_prefix")]
    pub cache_name_prefix: String,

    /// Version tag of the current deployment. Together with the prefix this
    /// names the current generation, e.g. "static-v1".
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// The application's own origin. Manifest entries and the fallback key
    /// resolve against it; hosts elsewhere are classified cross-origin.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// URLs (absolute or origin-relative) pre-populated at install time.
    #[serde(default = "default_asset_manifest")]
    pub asset_manifest: Vec<String>,

    /// Hostnames whose requests are classified as static assets even though
    /// they are cross-origin (CDN hosts).
    #[serde(default = "default_cdn_hosts")]
    pub cross_origin_allow_list: Vec<String>,

    /// Canonical key served when a navigation request fails and has no
    /// cached entry of its own. None disables the fallback.
    #[serde(default = "default_navigation_fallback_key")]
    pub navigation_fallback_key: Option<String>,

    /// Per-class strategy selection.
    #[serde(default)]
    pub strategy_map: StrategyMap,

    /// Whether opaque cross-origin responses may be cached.
    #[serde(default)]
    pub allow_opaque_caching: bool,

    /// Lenient install skips manifest entries that fail to fetch; strict
    /// install fails the whole phase on the first one.
    #[serde(default = "default_true")]
    pub lenient_install: bool,

    /// Path to the SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_cache_name_prefix() -> String {
    "static".into()
}

fn default_version_tag() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost".into()
}

fn default_asset_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/favicon.svg".into(), "/site.webmanifest".into()]
}

fn default_cdn_hosts() -> Vec<String> {
    DEFAULT_CDN_HOSTS.iter().map(|h| (*h).to_string()).collect()
}

fn default_navigation_fallback_key() -> Option<String> {
    Some("/index.html".into())
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcast-cache.sqlite")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_name_prefix: default_cache_name_prefix(),
            version_tag: default_version_tag(),
            origin: default_origin(),
            asset_manifest: default_asset_manifest(),
            cross_origin_allow_list: default_cdn_hosts(),
            navigation_fallback_key: default_navigation_fallback_key(),
            strategy_map: StrategyMap::default(),
            allow_opaque_caching: false,
            lenient_install: true,
            db_path: default_db_path(),
        }
    }
}

impl EngineConfig {
    /// Name of the current generation, e.g. "static-v1".
    pub fn generation_name(&self) -> String {
        format!("{}-{}", self.cache_name_prefix, self.version_tag)
    }

    /// Prefix that marks a generation as owned by this engine.
    pub fn generation_prefix(&self) -> String {
        format!("{}-", self.cache_name_prefix)
    }

    /// The configured origin as a parsed URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must include a host".into() });
        }
        Ok(url)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCAST_`
    /// 2. TOML file from `OFFCAST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation fails
    /// after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCAST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCAST_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
