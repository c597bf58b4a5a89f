//! missive protocol kernel.
//!
//! A missive node holds an append-only, content-addressed log of signed
//! messages and exchanges it with peers through trust-gated commands. This
//! crate is the transport-agnostic core shared by the daemon, the CLI, and
//! any embedder:
//!
//! - [`message`]: the universal envelope (canonical hashing, detached
//!   multi-signatures, verification)
//! - [`canonical`]: the deterministic JSON profile every hash and
//!   signature is computed over
//! - [`crypto`]: SHA-256 / Ed25519 primitives behind hex text forms
//! - [`identity`]: node keypairs
//! - [`trust`]: the set of keys a node authorizes commands from
//! - [`store`]: append-only message stores (memory, file)
//! - [`protocol`]: wire commands, result events, the transport contract
//! - [`sync`]: client-side push/pull/sync rounds with per-remote
//!   watermarks
//! - [`config`]: node configuration
//!
//! What this crate does *not* do: execute commands or listen on sockets.
//! That is the daemon's job; the seam between the two is the
//! [`protocol::Transport`] trait and the [`store::MessageStore`] contract.

pub mod canonical;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod message;
pub mod protocol;
pub mod store;
pub mod sync;
pub mod trust;

pub use identity::Identity;
pub use message::{Message, MessageError, Meta, Payload, SignatureKind, SignatureRecord};
pub use trust::TrustSet;
