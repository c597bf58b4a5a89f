//! The universal message envelope: hashing, signing, verification.
//!
//! Every value exchanged by the protocol is a [`Message`]: a plain message,
//! a command, a routing marker, or an error report, discriminated by
//! `kind`. Identity is content-addressed: `meta.hash` is a SHA-256 over the
//! canonical encoding of the envelope with `meta` excluded, so attaching or
//! stripping signatures never changes what a message *is*.
//!
//! Signatures are detached endorsements. Each one binds the signer to
//! `{hash, timestamp}`, a specific content hash at a specific signing
//! time, rather than to the raw message bytes. Verifiers can therefore
//! check signature age without rehashing anything but a two-field object,
//! and a command's freshness is the age of its *oldest* endorsement.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::canonical::{to_canonical_json, CanonicalError};
use crate::crypto::{content_hash_hex, verify_bytes};
use crate::identity::Identity;

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Errors from building, hashing, or signing a message.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The message body cannot be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonical(#[from] CanonicalError),

    /// The message cannot be represented as a JSON value.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A relative expiry expression did not parse.
    #[error("invalid expiry expression '{input}': {reason}")]
    InvalidExpiry {
        /// The rejected expression.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// The kind-discriminated payload of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A plain message carrying an arbitrary body value.
    Message {
        /// Free-form body content.
        body: Value,
    },

    /// A command to be executed by a remote peer.
    Command {
        /// Command name (`list`, `post`, `info`, ...).
        command: String,
        /// Free-form arguments, interpreted per command.
        #[serde(default)]
        args: Value,
    },

    /// An empty marker payload used purely as a signable envelope.
    Route,

    /// An error report.
    Error {
        /// Human-readable reason.
        reason: String,
        /// Status code in HTTP convention.
        status_code: u16,
    },
}

/// Role of a signature, when it endorses something narrower than execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// Endorses transport/routing of the message, not its execution.
    Route,
}

/// One detached endorsement of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Hex-encoded public key of the signer.
    pub public_key: String,

    /// Hex-encoded Ed25519 signature over `{hash, timestamp}`.
    pub signature: String,

    /// Epoch milliseconds at which the signature was produced.
    pub timestamp: i64,

    /// Optional role scope for the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SignatureKind>,
}

/// Content hash and signatures, excluded from the canonical form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Hex content hash of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Signatures in signing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signed: Vec<SignatureRecord>,
}

impl Meta {
    /// True when there is neither a hash nor any signature.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash.is_none() && self.signed.is_empty()
    }
}

/// The universal signed/hashable envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,

    /// Absolute time after which the message is considered stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,

    /// Kind-discriminated payload, flattened into the envelope.
    #[serde(flatten)]
    pub payload: Payload,

    /// Content hash and signatures.
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Message {
    /// Starts building a message with the given payload.
    #[must_use]
    pub fn build(payload: Payload) -> MessageBuilder {
        MessageBuilder {
            payload,
            timestamp: None,
            expiry: None,
        }
    }

    /// Starts building a plain message around a body value.
    #[must_use]
    pub fn plain(body: impl Into<Value>) -> MessageBuilder {
        Self::build(Payload::Message { body: body.into() })
    }

    /// Starts building a command message.
    #[must_use]
    pub fn command(command: impl Into<String>, args: Value) -> MessageBuilder {
        Self::build(Payload::Command {
            command: command.into(),
            args,
        })
    }

    /// The wire name of this message's kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            Payload::Message { .. } => "message",
            Payload::Command { .. } => "command",
            Payload::Route => "route",
            Payload::Error { .. } => "error",
        }
    }

    /// Computes the content hash over the canonical form with `meta`
    /// excluded.
    ///
    /// The result is identical for a message with zero, one, or many
    /// signatures attached; resigning never shifts identity.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] if the body violates the canonical profile
    /// (floats, oversized numbers, excessive nesting).
    pub fn content_hash(&self) -> Result<String, MessageError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            fields.remove("meta");
        }
        let canonical = to_canonical_json(&value)?;
        Ok(content_hash_hex(canonical.as_bytes()))
    }

    /// Computes and caches the content hash if not already present.
    ///
    /// # Errors
    ///
    /// Propagates [`Message::content_hash`] failures.
    pub fn ensure_hash(&mut self) -> Result<String, MessageError> {
        if let Some(hash) = &self.meta.hash {
            return Ok(hash.clone());
        }
        let hash = self.content_hash()?;
        self.meta.hash = Some(hash.clone());
        Ok(hash)
    }

    /// Signs the message with the given identity.
    ///
    /// Idempotent per public key: if this identity already signed, nothing
    /// is appended and `Ok(false)` is returned. Otherwise the signature is
    /// computed over `{hash, timestamp}` at the current time and appended,
    /// returning `Ok(true)`.
    ///
    /// # Errors
    ///
    /// Propagates hashing failures.
    pub fn sign(&mut self, identity: &Identity) -> Result<bool, MessageError> {
        self.sign_as(identity, None)
    }

    /// Signs with an explicit signature role.
    ///
    /// # Errors
    ///
    /// Propagates hashing failures.
    pub fn sign_as(
        &mut self,
        identity: &Identity,
        kind: Option<SignatureKind>,
    ) -> Result<bool, MessageError> {
        if self.signed_by(identity.public_key_hex()) {
            return Ok(false);
        }
        let hash = self.ensure_hash()?;
        let timestamp = now_millis();
        let payload = signature_payload(&hash, timestamp)?;
        let signature = identity.sign(payload.as_bytes());
        self.meta.signed.push(SignatureRecord {
            public_key: identity.public_key_hex().to_string(),
            signature,
            timestamp,
            kind,
        });
        Ok(true)
    }

    /// True if the given public key already appears among the signatures.
    #[must_use]
    pub fn signed_by(&self, public_key_hex: &str) -> bool {
        self.meta
            .signed
            .iter()
            .any(|record| record.public_key == public_key_hex)
    }

    /// Checks every signature record, in order.
    ///
    /// The expected hash is recomputed from the message content, so a
    /// tampered body or a forged `meta.hash` makes every signature report
    /// `false`. This is pure cryptographic validity; trust is a separate
    /// question answered by the server's trust set.
    #[must_use]
    pub fn verify(&self) -> Vec<bool> {
        let Ok(expected_hash) = self.content_hash() else {
            return vec![false; self.meta.signed.len()];
        };
        self.meta
            .signed
            .iter()
            .map(|record| {
                let Ok(payload) = signature_payload(&expected_hash, record.timestamp) else {
                    return false;
                };
                verify_bytes(&record.public_key, &record.signature, payload.as_bytes())
            })
            .collect()
    }

    /// Timestamp of the oldest signature, if any.
    #[must_use]
    pub fn oldest_signature_timestamp(&self) -> Option<i64> {
        self.meta.signed.iter().map(|record| record.timestamp).min()
    }

    /// True if the message carries an expiry in the past.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|expiry| expiry < now)
    }
}

/// Canonical signing payload binding a hash to a signing time.
fn signature_payload(hash: &str, timestamp: i64) -> Result<String, CanonicalError> {
    to_canonical_json(&json!({ "hash": hash, "timestamp": timestamp }))
}

/// Builder filling envelope defaults before the hash is computed.
///
/// The hash is attached exactly once, at [`MessageBuilder::finish`], after
/// the timestamp and expiry have settled; mutating a built message's
/// content would orphan its hash and every signature over it.
#[derive(Debug)]
pub struct MessageBuilder {
    payload: Payload,
    timestamp: Option<i64>,
    expiry: Option<ExpiryInput>,
}

#[derive(Debug)]
enum ExpiryInput {
    Absolute(i64),
    Relative(String),
}

impl MessageBuilder {
    /// Overrides the creation timestamp (defaults to now).
    #[must_use]
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets an absolute expiry, epoch milliseconds.
    #[must_use]
    pub fn expires_at(mut self, expiry: i64) -> Self {
        self.expiry = Some(ExpiryInput::Absolute(expiry));
        self
    }

    /// Sets a relative expiry expression such as `"90s"` or `"2h 30m"`,
    /// resolved against the creation timestamp at `finish` time.
    #[must_use]
    pub fn expires_in(mut self, expression: impl Into<String>) -> Self {
        self.expiry = Some(ExpiryInput::Relative(expression.into()));
        self
    }

    /// Fills defaults, normalizes the expiry, computes the hash.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] on an unparseable expiry expression or a
    /// body that violates the canonical profile.
    pub fn finish(self) -> Result<Message, MessageError> {
        let timestamp = self.timestamp.unwrap_or_else(now_millis);
        let expiry = match self.expiry {
            None => None,
            Some(ExpiryInput::Absolute(at)) => Some(at),
            Some(ExpiryInput::Relative(expression)) => {
                let duration = humantime::parse_duration(&expression).map_err(|err| {
                    MessageError::InvalidExpiry {
                        input: expression.clone(),
                        reason: err.to_string(),
                    }
                })?;
                let millis = i64::try_from(duration.as_millis()).map_err(|_| {
                    MessageError::InvalidExpiry {
                        input: expression,
                        reason: "duration overflows the timestamp range".to_string(),
                    }
                })?;
                Some(timestamp + millis)
            }
        };
        let mut message = Message {
            timestamp,
            expiry,
            payload: self.payload,
            meta: Meta::default(),
        };
        message.ensure_hash()?;
        Ok(message)
    }
}
