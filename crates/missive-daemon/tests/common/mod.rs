//! Shared fixtures for daemon integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use missive_core::protocol::Event;
use missive_core::store::{MemoryStore, MessageStore};
use missive_core::sync::{MemorySyncStore, Syncer};
use missive_core::{Identity, Message, TrustSet};
use missive_daemon::{Server, StoreExecutor};
use tokio::sync::mpsc;

/// One side of an exchange: an identity plus its local log.
pub struct TestNode {
    pub identity: Identity,
    pub store: Arc<MemoryStore>,
}

impl TestNode {
    pub fn new() -> Self {
        Self {
            identity: Identity::generate(),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Signs and appends a local message.
    pub async fn post_local(&self, body: &str) -> Message {
        let mut message = Message::plain(body).finish().expect("build message");
        message.sign(&self.identity).expect("sign message");
        self.store
            .append(message.clone())
            .await
            .expect("append message");
        message
    }

    /// A sync driver over this node's log with fresh bookmarks.
    pub fn syncer(&self) -> Syncer {
        Syncer::new(
            self.identity.clone(),
            self.store.clone(),
            Arc::new(MemorySyncStore::new()),
        )
    }
}

/// Builds a server for `node` that additionally trusts `trusted` keys.
pub fn server_for(node: &TestNode, trusted: &[&str]) -> Arc<Server> {
    server_with_max_age(node, trusted, Duration::from_secs(30))
}

/// Same, with an explicit signature freshness window.
pub fn server_with_max_age(
    node: &TestNode,
    trusted: &[&str],
    max_signature_age: Duration,
) -> Arc<Server> {
    let trust = TrustSet::new(
        node.identity.public_key_hex(),
        trusted.iter().map(|key| (*key).to_string()),
    );
    let store: Arc<dyn MessageStore> = node.store.clone();
    let executor = Arc::new(StoreExecutor::new(store, node.identity.clone()));
    Arc::new(Server::with_max_signature_age(
        executor,
        trust,
        max_signature_age,
    ))
}

/// Drains a handler's event channel to completion.
pub async fn collect(mut events: mpsc::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        collected.push(event);
        if terminal {
            break;
        }
    }
    collected
}

/// Splits events into data payloads and the terminal event.
pub fn split_terminal(events: Vec<Event>) -> (Vec<serde_json::Value>, Event) {
    let mut payloads = Vec::new();
    let mut terminal = None;
    for event in events {
        match event {
            Event::Data { payload } => payloads.push(payload),
            other => {
                terminal = Some(other);
                break;
            }
        }
    }
    (payloads, terminal.expect("stream must terminate"))
}
