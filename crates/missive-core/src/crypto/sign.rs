//! Ed25519 signing and verification over canonical payload bytes.
//!
//! Keys and signatures travel as hex text. Parsing is strict about lengths
//! so a truncated key can never alias a valid one, but the verification
//! helper itself never errors: a malformed key or signature is simply an
//! invalid signature from the caller's point of view.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use thiserror::Error;

/// Ed25519 public key size in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Errors from parsing key or signature material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The text form is not valid hex.
    #[error("invalid hex in {field}")]
    InvalidHex {
        /// Which field failed to decode.
        field: &'static str,
    },

    /// Key bytes have the wrong length.
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },

    /// The bytes do not describe a valid curve point.
    #[error("malformed public key")]
    MalformedKey,
}

/// Parses a hex-encoded Ed25519 public key.
///
/// # Errors
///
/// Returns [`KeyError`] on bad hex, wrong length, or bytes that do not
/// decode to a valid curve point.
pub fn parse_verifying_key(public_key_hex: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = hex::decode(public_key_hex).map_err(|_| KeyError::InvalidHex {
        field: "public_key",
    })?;
    let bytes: [u8; PUBLIC_KEY_SIZE] =
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| KeyError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                got: b.len(),
            })?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::MalformedKey)
}

/// Signs payload bytes, returning the hex text form of the signature.
#[must_use]
pub fn sign_bytes(key: &SigningKey, payload: &[u8]) -> String {
    hex::encode(key.sign(payload).to_bytes())
}

/// Checks a hex signature over payload bytes against a hex public key.
///
/// Never errors: malformed keys or signatures verify as `false`, which lets
/// callers treat "invalid" and "unverifiable" uniformly.
#[must_use]
pub fn verify_bytes(public_key_hex: &str, signature_hex: &str, payload: &[u8]) -> bool {
    let Ok(key) = parse_verifying_key(public_key_hex) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_SIZE]>::try_from(sig_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify(payload, &signature).is_ok()
}
