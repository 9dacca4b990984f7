//! Configuration validation rules.
//!
//! This module provides validation logic for `EngineConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::EngineConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl EngineConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_name_prefix` or `version_tag` is empty
    /// - `origin` does not parse as a URL with a host
    /// - a manifest entry or the fallback key cannot resolve against `origin`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "cache_name_prefix".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.version_tag.is_empty() {
            return Err(ConfigError::Invalid { field: "version_tag".into(), reason: "must not be empty".into() });
        }

        let origin = self.origin_url()?;

        for entry in &self.asset_manifest {
            origin.join(entry).map_err(|e| ConfigError::Invalid {
                field: "asset_manifest".into(),
                reason: format!("{entry}: {e}"),
            })?;
        }

        if let Some(key) = &self.navigation_fallback_key {
            origin.join(key).map_err(|e| ConfigError::Invalid {
                field: "navigation_fallback_key".into(),
                reason: format!("{key}: {e}"),
            })?;
        }

        if self.asset_manifest.is_empty() {
            tracing::warn!("asset_manifest is empty; nothing will be pre-populated at install");
        }

        Ok(())
    }
}
