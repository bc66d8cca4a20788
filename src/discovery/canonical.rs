//! Canonical identity of discovery records
//!
//! Two records that describe the same request must map to the same key, no
//! matter in which order their headers were supplied. The key covers the
//! method, the URI, the body (only for methods where it is significant) and
//! the multiset of request headers. The ignore flag and the source response
//! are not part of a record's identity.

use crate::discovery::DiscoveryRecord;
use sha2::{Digest, Sha256};
use std::fmt;

/// Methods whose body never changes which resource is requested
const BODYLESS_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS", "TRACE"];

/// Fixed-size identity of a record, used only for deduplication
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey([u8; 32]);

impl CanonicalKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex representation, used in logs
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Returns true if the request body takes part in identity for `method`
///
/// `method` is expected to be upper-case already.
pub fn body_is_significant(method: &str) -> bool {
    !BODYLESS_METHODS.contains(&method)
}

/// Computes the canonical key of a record
///
/// # Normalization Steps
///
/// 1. Upper-case the method
/// 2. Take the URI verbatim
/// 3. Take the body verbatim, or nothing for GET-like methods
/// 4. Lower-case header names and sort headers by (name, value)
/// 5. Length-prefix every component and hash the result with SHA-256
///
/// # Examples
///
/// ```
/// use spider_discovery::discovery::{canonicalize, DiscoveryRecord};
///
/// let a = DiscoveryRecord::builder()
///     .uri("https://server.com/0")
///     .request_headers(vec![("Accept", "*/*"), ("X-Custom", "xyz")])
///     .build();
/// let b = DiscoveryRecord::builder()
///     .uri("https://server.com/0")
///     .request_headers(vec![("X-Custom", "xyz"), ("Accept", "*/*"), ("", "")])
///     .build();
///
/// assert_eq!(canonicalize(&a), canonicalize(&b));
/// ```
pub fn canonicalize(record: &DiscoveryRecord) -> CanonicalKey {
    let method = record.method().to_ascii_uppercase();

    let mut headers: Vec<(String, &str)> = record
        .request_headers()
        .iter()
        .map(|h| (h.name.to_ascii_lowercase(), h.value.as_str()))
        .collect();
    headers.sort_unstable();

    let mut hasher = Sha256::new();
    write_field(&mut hasher, method.as_bytes());
    write_field(&mut hasher, record.uri().as_bytes());
    if body_is_significant(&method) {
        write_field(&mut hasher, record.body().as_bytes());
    } else {
        write_field(&mut hasher, b"");
    }
    write_field(&mut hasher, headers.len().to_string().as_bytes());
    for (name, value) in &headers {
        write_field(&mut hasher, name.as_bytes());
        write_field(&mut hasher, value.as_bytes());
    }

    CanonicalKey(hasher.finalize().into())
}

/// Writes `<len>:<bytes>` so that no two field sequences share an encoding
fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update(bytes.len().to_string().as_bytes());
    hasher.update(b":");
    hasher.update(bytes);
}
