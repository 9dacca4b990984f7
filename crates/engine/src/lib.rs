//! Cache-policy decision engine for offline-first clients.
//!
//! Given an intercepted request, the engine decides which caching strategy
//! applies (cache-first, network-first, or stale-while-revalidate), executes
//! it against a versioned cache store, and returns a response. Lifecycle
//! hooks pre-populate the current generation at install time and
//! garbage-collect stale generations at activation.

pub mod classify;
pub mod fetch;
pub mod lifecycle;

mod strategy;

pub use classify::Classifier;
pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use lifecycle::{Engine, Intercepted};
