//! Unified error types for offcast.
//!
//! Strategy-internal failures are recovered where the strategy defines a
//! fallback; everything else surfaces through these variants.

use tokio_rusqlite::rusqlite;

/// Unified error types for the cache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache backend could not be opened, read, or written.
    #[error("STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(String),

    /// Database operation failed.
    #[error("STORE_UNAVAILABLE: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_UNAVAILABLE: migration failed: {0}")]
    MigrationFailed(String),

    /// A network fetch failed at the transport level.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// A manifest entry could not be fetched during install.
    #[error("ASSET_UNAVAILABLE: {0}")]
    AssetUnavailable(String),

    /// A lifecycle hook was invoked in the wrong phase or re-entered.
    #[error("PHASE_ERROR: {0}")]
    Phase(String),

    /// Configuration failed to load or validate.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
