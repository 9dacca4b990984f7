//! Network fetch boundary.
//!
//! The engine talks to the network through the [`Fetcher`] trait so hosts
//! can supply their own transport. [`HttpFetcher`] is the shipped
//! reqwest-backed implementation.
//!
//! Transport failures map to `Error::NetworkFailure`. Resolved HTTP
//! responses are returned whatever their status; cacheability is decided by
//! the store, not the fetcher.

use async_trait::async_trait;
use offcast_core::{Error, Request, Response};
use std::time::{Duration, Instant};

/// Host-supplied network boundary.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the network.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the shipped HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcast/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Optional per-request deadline. The engine itself imposes no timeout;
    /// a hung fetch stalls that request's strategy indefinitely unless this
    /// is set.
    pub timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "offcast/0.1".to_string(), max_bytes: 5 * 1024 * 1024, timeout: None }
    }
}

/// HTTP fetcher built on reqwest.
///
/// Never produces opaque responses; the opaque marker exists for host
/// environments whose transport can.
pub struct HttpFetcher {
    http: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut req = self.http.get(request.url.as_str());
        if let Some(accept) = &request.accept {
            req = req.header("Accept", accept.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("network error: {}", e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect::<Vec<_>>();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::NetworkFailure(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            request.url,
            status,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response { status, opaque: false, headers, body: bytes })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Scripted fetcher for tests. URLs without a scripted response fail
    /// with a network error, which doubles as "network down".
    #[derive(Default)]
    pub(crate) struct MockFetcher {
        routes: Mutex<HashMap<String, Response>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(&self, url: &str, response: Response) {
            let normalized = Url::parse(url).unwrap().to_string();
            self.routes.lock().unwrap().insert(normalized, response);
        }

        pub(crate) fn fail(&self, url: &str) {
            let normalized = Url::parse(url).unwrap().to_string();
            self.routes.lock().unwrap().remove(&normalized);
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.routes.lock().unwrap().get(request.url.as_str()) {
                Some(response) => Ok(response.clone()),
                None => Err(Error::NetworkFailure(format!("no route to {}", request.url))),
            }
        }
    }
}
