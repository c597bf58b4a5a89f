//! Node identity: an Ed25519 keypair with hex text forms.
//!
//! The public key doubles as the node's name everywhere in the protocol
//! (trust sets, signature records, sync remotes), so it is kept pre-encoded.
//! Secret material never appears in `Debug` output or serialized forms;
//! persisting a key is an explicit `secret_key_hex()` call by the config
//! layer.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::crypto::{sign_bytes, KeyError};

/// An Ed25519 keypair identifying one node.
#[derive(Clone)]
pub struct Identity {
    signing: SigningKey,
    public_hex: String,
}

impl Identity {
    /// Generates a fresh random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Reconstructs an identity from a hex-encoded secret key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] on bad hex or wrong length.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret_hex).map_err(|_| KeyError::InvalidHex {
            field: "secret_key",
        })?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| KeyError::InvalidKeyLength {
                expected: 32,
                got: b.len(),
            })?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes)))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let public_hex = hex::encode(signing.verifying_key().to_bytes());
        Self { signing, public_hex }
    }

    /// The hex text form of the public key.
    #[must_use]
    pub fn public_key_hex(&self) -> &str {
        &self.public_hex
    }

    /// The hex text form of the secret key, for config persistence.
    #[must_use]
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    /// The verifying half of the keypair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Signs payload bytes, returning the hex signature.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> String {
        sign_bytes(&self.signing, payload)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_hex)
            .finish_non_exhaustive()
    }
}
