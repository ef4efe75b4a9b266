//! Hashing primitives for the record chain and content addressing.
//!
//! The chain uses SHA-256 throughout. Two digest renderings exist and must
//! not be mixed: the record chain uses raw lowercase hex, while blob-store
//! content addresses and config hashes carry a `sha256:` prefix.

use sha2::{Digest, Sha256};

/// Digest rendering prefix for content addresses and config hashes.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Computes the link hash sealing a record into the chain.
///
/// The input is the octet-concatenation
/// `prev_hash | timestamp | kind | source | payload` joined with the ASCII
/// pipe `0x7C`. The encoding is unambiguous only while `kind` and `source`
/// are pipe-free; the store rejects inputs that violate this.
#[must_use]
pub fn link_hash(prev_hash: &str, timestamp: i64, kind: &str, source: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_bytes());
    hasher.update(b"|");
    hasher.update(source.as_bytes());
    hasher.update(b"|");
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the raw lowercase-hex SHA-256 digest of a byte sequence.
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Computes a `sha256:`-prefixed digest, the form used by config `hash`
/// fields and blob descriptors.
#[must_use]
pub fn prefixed_digest(bytes: &[u8]) -> String {
    format!("{DIGEST_PREFIX}{}", content_digest(bytes))
}

/// Computes the snapshot hash binding a set of records to a chain prefix.
///
/// The input is the `|`-joined record hashes in ascending id order.
#[must_use]
pub fn snapshot_hash<'a, I>(record_hashes: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined: Vec<&str> = record_hashes.into_iter().collect();
    content_digest(joined.join("|").as_bytes())
}
