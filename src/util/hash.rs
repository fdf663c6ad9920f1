//! Query identifiers derived from query text.
//!
//! Uses SHA256 over the whitespace-normalized query so that reformatting a
//! JQL string does not orphan its checkpoint.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
const QUERY_ID_LENGTH: usize = 12;

/// Derive a stable query id from a JQL-like query string.
#[must_use]
pub fn query_id(query: &str) -> String {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..QUERY_ID_LENGTH].to_string()
}
