//! missive daemon: trust-gated command execution over pluggable
//! transports.
//!
//! The [`server::Server`] is the authorization core: it verifies
//! signatures, enforces the freshness window, rejects replays, and demands
//! unanimous trust before anything runs. Transports
//! ([`transport::socket`], [`transport::http`], [`transport::in_process`])
//! are thin byte adapters around it, and [`executor::StoreExecutor`] binds
//! the standard commands to a message store.
//!
//! The crate doubles as a library so the CLI (and tests) can embed the
//! client transports and, when useful, a whole in-process server.

pub mod executor;
pub mod server;
pub mod transport;

pub use executor::{CommandExecutor, CommandOutput, ExecutorError, StoreExecutor};
pub use server::{ReplayCache, Server, DEFAULT_MAX_SIGNATURE_AGE};
