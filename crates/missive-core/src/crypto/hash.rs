//! SHA-256 content hashing over canonical bytes.

use sha2::{Digest, Sha256};

/// Size of a content hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte content digest.
pub type ContentDigest = [u8; HASH_SIZE];

/// Hashes canonical bytes into a content digest.
#[must_use]
pub fn content_digest(canonical: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    hasher.finalize().into()
}

/// Hashes canonical bytes and returns the hex text form used on the wire.
#[must_use]
pub fn content_hash_hex(canonical: &[u8]) -> String {
    hex::encode(content_digest(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        // Known SHA-256 vector: the digest must never change across
        // releases or the whole log keyspace shifts.
        assert_eq!(
            content_hash_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_form_is_lowercase_and_fixed_width() {
        let h = content_hash_hex(b"anything");
        assert_eq!(h.len(), HASH_SIZE * 2);
        assert_eq!(h, h.to_lowercase());
    }
}
