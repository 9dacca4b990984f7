//! Request classification into policy classes.
//!
//! Classification is a pure function of the request and the configured
//! origin/allow-list. The check order is fixed: navigation first, then
//! static asset, then cross-origin, with everything else falling through to
//! default. Non-GET requests never reach the classifier; the lifecycle
//! controller passes them through untouched.

use offcast_core::{Destination, PolicyClass, Request};

/// Maps requests to policy classes.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin_host: String,
    cdn_hosts: Vec<String>,
}

impl Classifier {
    pub fn new(origin_host: impl Into<String>, cdn_hosts: Vec<String>) -> Self {
        Self { origin_host: origin_host.into(), cdn_hosts }
    }

    /// Assign exactly one policy class to a request.
    pub fn classify(&self, request: &Request) -> PolicyClass {
        let accepts_html = request.accept.as_deref().is_some_and(|a| a.contains("text/html"));
        if request.navigation || accepts_html {
            return PolicyClass::Navigation;
        }

        let host = request.host().unwrap_or("");
        let static_destination = matches!(
            request.destination,
            Destination::Script | Destination::Style | Destination::Font | Destination::Image | Destination::Worker
        );
        if static_destination || self.cdn_hosts.iter().any(|h| h == host) {
            return PolicyClass::StaticAsset;
        }

        if host != self.origin_host {
            return PolicyClass::CrossOrigin;
        }

        PolicyClass::Default
    }
}
