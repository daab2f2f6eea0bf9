//! Request identity keys.

use sha2::{Digest, Sha256};

/// Compute the key identifying a request within a cache container.
///
/// Two requests share a key exactly when their method and URL match.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
