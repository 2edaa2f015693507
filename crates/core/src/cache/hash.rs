//! Request key generation for partition entries.

use sha2::{Digest, Sha256};

/// Compute the partition key for a request.
///
/// `url` must already be canonical (see the client's `canonicalize`): the query
/// string takes part in the key, the fragment does not.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
