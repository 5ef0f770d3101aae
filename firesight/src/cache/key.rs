//! Cache key derivation.
//!
//! A [`CacheKey`] is a SHA-256 digest over every field of an
//! [`ImageRequest`], so identical requests always map to the same key
//! and any field difference produces a different key with
//! overwhelming probability. Floating-point fields are hashed via
//! their IEEE-754 bit patterns to keep the derivation bit-exact.
//!
//! The lowercase hex form doubles as the on-disk filename stem, which
//! keeps the disk index rebuildable from a directory scan alone.

use sha2::{Digest, Sha256};

use crate::request::ImageRequest;

/// Field separator inside the digest input. Prevents ambiguity
/// between adjacent variable-length fields.
const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// Deterministic, collision-resistant digest of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a request.
    pub fn for_request(request: &ImageRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.satellite().as_str().as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(request.product().as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(request.date().to_string().as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(request.latitude().to_bits().to_be_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(request.longitude().to_bits().to_be_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(request.radius_km().to_bits().to_be_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            // write! to a String cannot fail
            let _ = write!(hex, "{:02x}", byte);
        }
        Self(hex)
    }

    /// Reconstruct a key from its hex form (e.g. a filename stem).
    ///
    /// Returns `None` unless the input is exactly 64 lowercase hex
    /// characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            Some(Self(hex.to_string()))
        } else {
            None
        }
    }

    /// The lowercase hex form of the digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
