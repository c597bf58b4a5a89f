//! Transport bindings for the command protocol.
//!
//! All bindings carry the same canonical serde representation of messages
//! and events, so server-side verification is insulated from transport
//! formatting. Three substrates share the one contract:
//!
//! - [`socket`]: newline-delimited JSON frames over a Unix domain socket
//! - [`http`]: one POST per command, NDJSON event stream in the response
//! - [`in_process`]: direct invocation, for tests and same-process pairs

pub mod http;
pub mod in_process;
pub mod socket;

pub use http::{router, HttpTransport};
pub use in_process::InProcessTransport;
pub use socket::{SocketServer, SocketTransport};

/// Maximum accepted frame length, matching HTTP-side body expectations.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Status code used when the failure is in the transport, not the server.
pub(crate) const TRANSPORT_ERROR_STATUS: u16 = 502;
