//! Content hashing for cache keys.
//!
//! Keys only need to be deterministic and well distributed; a collision
//! costs a wrong cache hit that the caller's next revalidation corrects.

use sha2::{Digest, Sha256};

/// Hash a text body into a hex cache key.
pub fn hash_content(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex(&hasher.finalize())
}

/// Hash a text body together with a context qualifier (e.g. a chapter id),
/// so the same text analyzed in different contexts keys separately.
pub fn hash_with_context(text: &str, context: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(context.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
