//! Minimal request/response abstraction at the interception boundary.
//!
//! The engine sits between an HTTP-like boundary and the cache store; it only
//! consumes the handful of fields needed for classification and cacheability.
//! Hosts map their own request/response types onto these.

use bytes::Bytes;
use url::Url;

/// What kind of resource a request is for, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Document,
    Script,
    Style,
    Font,
    Image,
    Worker,
    #[default]
    Other,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: Url,
    /// Set for top-level page loads.
    pub navigation: bool,
    /// Raw Accept header text, if any.
    pub accept: Option<String>,
    pub destination: Destination,
}

impl Request {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            navigation: false,
            accept: None,
            destination: Destination::Other,
        }
    }

    /// A plain GET request with no navigation flag or accept signal.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_navigation(mut self, navigation: bool) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

/// A response snapshot: status, headers, and body bytes.
///
/// Stored responses and network responses share this shape, so a cache hit is
/// indistinguishable from a fresh fetch at the type level.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Cross-origin responses whose status and body the client cannot
    /// inspect. Reported by the host; the shipped HTTP fetcher never sets it.
    pub opaque: bool,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, opaque: false, headers: Vec::new(), body: body.into() }
    }

    /// An opaque cross-origin response (status reads as 0).
    pub fn opaque(body: impl Into<Bytes>) -> Self {
        Self { status: 0, opaque: true, headers: Vec::new(), body: body.into() }
    }

    /// Whether this response may be written to the cache.
    ///
    /// Only status-200 responses qualify, plus opaque responses when the
    /// policy explicitly permits them.
    pub fn is_cacheable(&self, allow_opaque: bool) -> bool {
        self.status == 200 || (self.opaque && allow_opaque)
    }
}
