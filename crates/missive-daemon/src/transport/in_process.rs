//! In-process transport: no bytes, same contract.
//!
//! Invokes the server core directly, preserving the ordering and
//! termination semantics of the byte-level transports. Used by tests and
//! by clients sharing a process with their server.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use missive_core::protocol::{EventStream, Transport, TransportError};
use missive_core::Message;

use crate::server::Server;

/// Transport that calls straight into a [`Server`].
pub struct InProcessTransport {
    server: Arc<Server>,
}

impl InProcessTransport {
    /// Creates a transport around a shared server.
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, message: &Message) -> Result<EventStream, TransportError> {
        let events = self.server.handle(message.clone());
        Ok(
            futures::stream::unfold(events, |mut events| async move {
                events.recv().await.map(|event| (event, events))
            })
            .boxed(),
        )
    }
}
