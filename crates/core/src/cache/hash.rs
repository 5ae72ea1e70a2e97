//! Cache key generation.

use sha2::{Digest, Sha256};

/// Compute the entry key for a normalized request URL.
///
/// Only the URL participates: the router caches `GET` responses alone and
/// does not vary on request headers.
pub fn compute_entry_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
