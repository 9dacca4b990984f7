//! Lifecycle orchestration: install, activate, intercept.
//!
//! The engine moves through a small phase machine. Install pre-populates the
//! current generation from the asset manifest, activate garbage-collects
//! stale generations, and intercept is the steady-state entry point that
//! classifies each request and runs the selected strategy. Phase transitions
//! use compare-exchange so no phase can be re-entered while in progress.

use crate::classify::Classifier;
use crate::fetch::Fetcher;
use crate::strategy;
use offcast_core::{CacheDb, EngineConfig, Error, PolicyClass, Request, Response, VersionedStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use url::Url;

const NEW: u8 = 0;
const INSTALLING: u8 = 1;
const INSTALLED: u8 = 2;
const ACTIVATING: u8 = 3;
const ACTIVE: u8 = 4;

fn phase_name(phase: u8) -> &'static str {
    match phase {
        NEW => "new",
        INSTALLING => "installing",
        INSTALLED => "installed",
        ACTIVATING => "activating",
        ACTIVE => "active",
        _ => "unknown",
    }
}

/// Result of intercepting a request.
#[derive(Debug)]
pub enum Intercepted {
    /// The engine produced a response.
    Response(Response),
    /// The request is not handled; the host should use its normal network path.
    Passthrough,
}

/// The lifecycle controller: owns the store, the fetcher, and the phase.
pub struct Engine {
    config: EngineConfig,
    store: VersionedStore,
    fetcher: Arc<dyn Fetcher>,
    classifier: Classifier,
    origin: Url,
    fallback: Option<Url>,
    phase: AtomicU8,
}

impl Engine {
    /// Build an engine from validated configuration.
    ///
    /// The configuration is immutable from here on; a new version tag means
    /// a new deployment and a new engine.
    pub fn new(config: EngineConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        config.validate()?;
        let origin = config.origin_url()?;

        let fallback = match &config.navigation_fallback_key {
            Some(key) => Some(origin.join(key).map_err(|e| {
                Error::Config(offcast_core::ConfigError::Invalid {
                    field: "navigation_fallback_key".into(),
                    reason: e.to_string(),
                })
            })?),
            None => None,
        };

        let classifier = Classifier::new(
            origin.host_str().unwrap_or_default(),
            config.cross_origin_allow_list.clone(),
        );
        let store = VersionedStore::new(db, config.allow_opaque_caching);

        Ok(Self {
            config,
            store,
            fetcher,
            classifier,
            origin,
            fallback,
            phase: AtomicU8::new(NEW),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn transition(&self, from: u8, to: u8, hook: &str) -> Result<(), Error> {
        self.phase
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| {
                Error::Phase(format!(
                    "{hook} invoked in phase {}, expected {}",
                    phase_name(actual),
                    phase_name(from)
                ))
            })
    }

    /// Pre-populate the current generation from the asset manifest.
    ///
    /// In lenient mode (the default), manifest entries that fail to fetch
    /// are logged and skipped so one unreachable asset cannot keep the
    /// application shell from becoming available offline. In strict mode
    /// the first failure aborts the phase and the engine returns to its
    /// initial phase so install can be retried.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(NEW, INSTALLING, "install")?;
        match self.install_assets().await {
            Ok(()) => {
                self.phase.store(INSTALLED, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.phase.store(NEW, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn install_assets(&self) -> Result<(), Error> {
        let generation = self.config.generation_name();
        let cache = self.store.open(&generation).await?;
        tracing::debug!("installing {} manifest entries into {}", self.config.asset_manifest.len(), generation);

        for entry in &self.config.asset_manifest {
            let url = self
                .origin
                .join(entry)
                .map_err(|e| Error::AssetUnavailable(format!("{entry}: {e}")))?;
            let request = Request::get(url);

            let outcome = match self.fetcher.fetch(&request).await {
                Ok(response) => match cache.put(&request, &response).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Error::AssetUnavailable(format!(
                        "{}: status {} is not cacheable",
                        request.url, response.status
                    ))),
                    Err(e) => Err(e),
                },
                Err(e) => Err(Error::AssetUnavailable(format!("{}: {e}", request.url))),
            };

            if let Err(e) = outcome {
                if self.config.lenient_install && matches!(e, Error::AssetUnavailable(_)) {
                    tracing::warn!("skipping manifest entry: {e}");
                } else {
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Garbage-collect stale generations, then enter steady state.
    ///
    /// Deletes every generation carrying this engine's prefix except the
    /// current one. Individual delete failures are logged and skipped;
    /// activation still completes. Safe to call again while active.
    pub async fn activate(&self) -> Result<(), Error> {
        if self.transition(INSTALLED, ACTIVATING, "activate").is_err() {
            self.transition(ACTIVE, ACTIVATING, "activate")?;
        }

        let current = self.config.generation_name();
        let prefix = self.config.generation_prefix();

        match self.store.list_generations().await {
            Ok(names) => {
                for name in names {
                    if name.starts_with(&prefix) && name != current {
                        match self.store.delete(&name).await {
                            Ok(()) => tracing::debug!("deleted stale generation {name}"),
                            Err(e) => tracing::warn!("failed to delete stale generation {name}: {e}"),
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("could not enumerate generations: {e}"),
        }

        self.phase.store(ACTIVE, Ordering::SeqCst);
        Ok(())
    }

    /// Classify one request, select a strategy, and execute it.
    ///
    /// Non-GET requests and requests arriving before activation pass
    /// through untouched. If the store cannot be opened the request is
    /// served network-only.
    pub async fn intercept(&self, request: &Request) -> Result<Intercepted, Error> {
        if self.phase.load(Ordering::SeqCst) != ACTIVE {
            return Ok(Intercepted::Passthrough);
        }
        if !request.is_get() {
            return Ok(Intercepted::Passthrough);
        }

        let class = self.classifier.classify(request);
        let kind = self.config.strategy_map.for_class(class);
        tracing::debug!("{} classified {:?}, strategy {:?}", request.url, class, kind);

        let cache = match self.store.open(&self.config.generation_name()).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("cache store unavailable, going network-only: {e}");
                return self.fetcher.fetch(request).await.map(Intercepted::Response);
            }
        };

        let fallback = match class {
            PolicyClass::Navigation => self.fallback.as_ref(),
            _ => None,
        };

        let response = strategy::run(kind, &self.fetcher, &cache, request, fallback).await?;
        Ok(Intercepted::Response(response))
    }
}
