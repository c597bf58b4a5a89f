//! Cryptographic primitives for the message protocol.
//!
//! - **SHA-256 hashing** of canonical message bytes (content addressing)
//! - **Ed25519 signatures** binding a signer to a content hash at a point
//!   in time
//!
//! Hashes, keys, and signatures all travel as lowercase hex text; the rest
//! of the crate treats them as opaque strings.

mod hash;
mod sign;

pub use hash::{content_digest, content_hash_hex, ContentDigest, HASH_SIZE};
pub use sign::{
    parse_verifying_key, sign_bytes, verify_bytes, KeyError, PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
};
