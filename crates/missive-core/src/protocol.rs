//! Wire protocol shared by the server, the transports, and the sync engine.
//!
//! A request is one signed command [`Message`]; a response is an ordered
//! stream of tagged [`Event`]s with exactly one terminal event:
//!
//! ```text
//! data* end      (success, zero or more results)
//! data* error    (failure; error always terminates the stream)
//! ```
//!
//! Transports differ only in how these cross a process boundary: socket
//! frames, HTTP bodies, or nothing at all for the in-process binding. All
//! of them carry the same canonical serde representation so server-side
//! verification is insulated from transport formatting.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identity::Identity;
use crate::message::{Message, MessageError};

/// Command name: incremental log listing.
pub const COMMAND_LIST: &str = "list";

/// Command name: idempotent message insert.
pub const COMMAND_POST: &str = "post";

/// Command name: server identity and version.
pub const COMMAND_INFO: &str = "info";

/// Arguments for the `list` command.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListArgs {
    /// Only messages with a timestamp strictly greater than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

/// Arguments for the `post` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostArgs {
    /// The message to insert.
    pub message: Message,
}

/// Reply payload of the `info` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoReply {
    /// The server's hex public key.
    pub public_key: String,
    /// Server software version.
    pub version: String,
}

/// One tagged event in a command's result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One produced result value.
    Data {
        /// The result payload.
        payload: Value,
    },

    /// Terminal failure.
    Error {
        /// Human-readable reason.
        message: String,
        /// Status code in HTTP convention.
        status_code: u16,
    },

    /// Terminal success marker.
    End,
}

impl Event {
    /// True for `end` and `error`, the events that close a stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error { .. })
    }
}

/// Ordered stream of result events; consumers may drop it early.
pub type EventStream = BoxStream<'static, Event>;

/// Errors raised by a transport before or while streaming.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The byte channel failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A message or event could not be encoded or decoded.
    #[error("transport encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The connection could not be established or was refused.
    #[error("connection failed: {reason}")]
    Connection {
        /// Description of the failure.
        reason: String,
    },
}

/// A substrate-specific channel implementing the shared send contract.
///
/// `send` delivers one signed command and yields the remote's result
/// stream. Implementations must preserve event order, terminate with
/// exactly one terminal event, and surface connection failures as an error
/// rather than hanging. Dropping the returned stream abandons the request
/// and releases transport resources.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one signed message and opens its result stream.
    async fn send(&self, message: &Message) -> Result<EventStream, TransportError>;
}

/// Builds and signs a command message in one step.
///
/// # Errors
///
/// Propagates build/signing failures from the message layer.
pub fn signed_command(
    identity: &Identity,
    command: &str,
    args: Value,
) -> Result<Message, MessageError> {
    let mut message = Message::command(command, args).finish()?;
    message.sign(identity)?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn events_serialize_with_type_tags() {
        let data = serde_json::to_value(Event::Data {
            payload: json!({"n": 1}),
        })
        .unwrap();
        assert_eq!(data["type"], "data");

        let end = serde_json::to_value(Event::End).unwrap();
        assert_eq!(end, json!({"type": "end"}));

        let error = serde_json::to_value(Event::Error {
            message: "nope".into(),
            status_code: 400,
        })
        .unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["status_code"], 400);
    }

    #[test]
    fn terminal_classification() {
        assert!(Event::End.is_terminal());
        assert!(Event::Error {
            message: String::new(),
            status_code: 500
        }
        .is_terminal());
        assert!(!Event::Data { payload: json!(1) }.is_terminal());
    }

    #[test]
    fn signed_command_is_hashed_and_signed() {
        let identity = Identity::generate();
        let command = signed_command(&identity, COMMAND_LIST, json!({})).unwrap();
        assert_eq!(command.kind(), "command");
        assert!(command.meta.hash.is_some());
        assert!(command.signed_by(identity.public_key_hex()));
        assert_eq!(command.verify(), vec![true]);
    }
}
