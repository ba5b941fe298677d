//! Content hashing for metadata records
//!
//! Sources persist a digest of each record's significant fields; the diff
//! engine only ever compares digests. This helper exists for sources and
//! test fixtures that build records in-process.

use sha2::{Digest, Sha256};

/// Deterministic SHA-256 hex digest over an ordered list of fields.
///
/// Fields are separated by a unit separator so `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
pub fn content_hash<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
