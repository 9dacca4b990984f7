//! Policy classes and strategy mapping.
//!
//! Every intercepted GET request is assigned exactly one [`PolicyClass`];
//! the [`StrategyMap`] decides which caching strategy runs for each class.
//! The mapping is plain configuration data so hosts can override it without
//! touching the engine.

use serde::{Deserialize, Serialize};

/// Request classes the engine distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyClass {
    /// Top-level page load, or a request whose Accept signal indicates HTML.
    Navigation,
    /// Script/style/font/image/worker destinations and allow-listed CDN hosts.
    StaticAsset,
    /// Foreign-origin requests not covered by the static-asset rules.
    CrossOrigin,
    /// Same-origin, non-navigation, non-static requests.
    Default,
}

/// The caching strategies the executor implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Serve from cache, revalidate in the background; network on miss.
    CacheFirst,
    /// Try the network; fall back to cache, then to the fallback key.
    NetworkFirst,
    /// Serve stale from cache immediately, refresh the entry concurrently.
    StaleWhileRevalidate,
}

/// Per-class strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMap {
    #[serde(default = "default_navigation")]
    pub navigation: StrategyKind,
    #[serde(default = "default_static_asset")]
    pub static_asset: StrategyKind,
    #[serde(default = "default_cross_origin")]
    pub cross_origin: StrategyKind,
    #[serde(default = "default_default")]
    pub default: StrategyKind,
}

fn default_navigation() -> StrategyKind {
    StrategyKind::NetworkFirst
}

fn default_static_asset() -> StrategyKind {
    StrategyKind::StaleWhileRevalidate
}

fn default_cross_origin() -> StrategyKind {
    StrategyKind::StaleWhileRevalidate
}

fn default_default() -> StrategyKind {
    StrategyKind::CacheFirst
}

impl Default for StrategyMap {
    fn default() -> Self {
        Self {
            navigation: default_navigation(),
            static_asset: default_static_asset(),
            cross_origin: default_cross_origin(),
            default: default_default(),
        }
    }
}

impl StrategyMap {
    pub fn for_class(&self, class: PolicyClass) -> StrategyKind {
        match class {
            PolicyClass::Navigation => self.navigation,
            PolicyClass::StaticAsset => self.static_asset,
            PolicyClass::CrossOrigin => self.cross_origin,
            PolicyClass::Default => self.default,
        }
    }
}
