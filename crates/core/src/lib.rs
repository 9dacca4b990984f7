//! Core types and shared functionality for offcast.
//!
//! This crate provides:
//! - Versioned cache store with SQLite backend
//! - Request/response abstraction at the interception boundary
//! - Policy classes and strategy mapping
//! - Unified error types and layered configuration

pub mod config;
pub mod error;
pub mod http;
pub mod policy;
pub mod store;

pub use config::{ConfigError, DEFAULT_CDN_HOSTS, EngineConfig};
pub use error::Error;
pub use http::{Destination, Request, Response};
pub use policy::{PolicyClass, StrategyKind, StrategyMap};
pub use store::{CacheDb, CacheHandle, VersionedStore};
