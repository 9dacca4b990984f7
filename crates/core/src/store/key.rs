//! Content-addressed entry key generation.
//!
//! Entries are keyed by method and full URL, so matching is exact: query
//! strings are significant and callers wanting canonical matching (e.g.
//! navigation fallbacks) normalize the URL before looking it up.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the cache key for a request.
pub fn entry_key(method: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
