//! Cache key generation using SHA-256 hashes

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Generate a deterministic cache key for a request.
///
/// The key is a SHA-256 hash of the upper-cased method and the URL without
/// its fragment. `Url` parsing already lower-cases the host and drops
/// default ports, so equivalent spellings of a URL share a key.
pub fn request_key(method: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();

    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_url(url).as_bytes());

    format!("{:x}", hasher.finalize())
}

/// URL as stored alongside an entry: fragment removed
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
