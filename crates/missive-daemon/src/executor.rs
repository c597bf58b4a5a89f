//! Command execution behind the authorization gate.
//!
//! The server core authorizes; executors act. An executor is only ever
//! invoked with a fully verified, fresh, unanimously trusted command, so
//! implementations can stay oblivious to signatures and trust.
//!
//! [`StoreExecutor`] is the built-in executor binding the standard
//! commands (`list`, `post`, `info`) to a message store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use missive_core::message::{now_millis, MessageError};
use missive_core::protocol::{
    InfoReply, ListArgs, PostArgs, COMMAND_INFO, COMMAND_LIST, COMMAND_POST,
};
use missive_core::store::{MessageStore, StoreError};
use missive_core::{Identity, SignatureKind};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from command execution.
///
/// These never reach the wire verbatim; the server core logs them and
/// surfaces a generic failure so internals stay internal.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The command name is not implemented.
    #[error("unknown command '{command}'")]
    UnknownCommand {
        /// The rejected command name.
        command: String,
    },

    /// Arguments or results failed to encode or decode.
    #[error("JSON codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// The message store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A message operation failed.
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// What a command produced: one value or a lazy sequence of values.
pub enum CommandOutput {
    /// A single result value.
    Single(Value),
    /// A lazy sequence, streamed to the caller in production order.
    Stream(BoxStream<'static, Value>),
}

/// Executes authorized commands.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs a command with free-form arguments.
    async fn run(&self, command: &str, args: Value) -> Result<CommandOutput, ExecutorError>;
}

/// The standard executor: `list`, `post`, and `info` over a message store.
pub struct StoreExecutor {
    store: Arc<dyn MessageStore>,
    identity: Identity,
}

impl StoreExecutor {
    /// Creates an executor around a store and the serving identity.
    pub fn new(store: Arc<dyn MessageStore>, identity: Identity) -> Self {
        Self { store, identity }
    }

    async fn list(&self, args: Value) -> Result<CommandOutput, ExecutorError> {
        let args: ListArgs = if args.is_null() {
            ListArgs::default()
        } else {
            parse_args(args)?
        };
        let now = now_millis();
        let messages: Vec<Value> = self
            .store
            .list_since(args.since)
            .await?
            .into_iter()
            .filter(|message| !message.is_expired(now))
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?;
        debug!(count = messages.len(), since = ?args.since, "listing messages");
        Ok(CommandOutput::Stream(stream::iter(messages).boxed()))
    }

    async fn post(&self, args: Value) -> Result<CommandOutput, ExecutorError> {
        let PostArgs { mut message } = parse_args(args)?;
        let hash = message.ensure_hash()?;

        if let Some(existing) = self.store.get(&hash).await? {
            // Idempotent insert: the stored copy, with whatever signatures
            // it accumulated, is the authoritative one.
            return Ok(CommandOutput::Single(serde_json::to_value(existing)?));
        }

        // Endorse transport of this message under the serving identity.
        message.sign_as(&self.identity, Some(SignatureKind::Route))?;
        self.store.append(message.clone()).await?;
        debug!(%hash, "stored posted message");
        Ok(CommandOutput::Single(serde_json::to_value(message)?))
    }

    fn info(&self) -> Result<CommandOutput, ExecutorError> {
        let reply = InfoReply {
            public_key: self.identity.public_key_hex().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Ok(CommandOutput::Single(serde_json::to_value(reply)?))
    }
}

#[async_trait]
impl CommandExecutor for StoreExecutor {
    async fn run(&self, command: &str, args: Value) -> Result<CommandOutput, ExecutorError> {
        match command {
            COMMAND_LIST => self.list(args).await,
            COMMAND_POST => self.post(args).await,
            COMMAND_INFO => self.info(),
            other => Err(ExecutorError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }
}

/// Decodes command arguments against a command's schema.
fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ExecutorError> {
    Ok(serde_json::from_value(args)?)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use missive_core::store::MemoryStore;
    use missive_core::Message;
    use serde_json::json;

    use super::*;

    fn executor() -> (StoreExecutor, Arc<MemoryStore>, Identity) {
        let store = Arc::new(MemoryStore::new());
        let identity = Identity::generate();
        (
            StoreExecutor::new(store.clone(), identity.clone()),
            store,
            identity,
        )
    }

    async fn drain(output: CommandOutput) -> Vec<Value> {
        match output {
            CommandOutput::Single(value) => vec![value],
            CommandOutput::Stream(stream) => stream.collect().await,
        }
    }

    #[tokio::test]
    async fn list_streams_stored_messages_in_order() {
        let (executor, store, _) = executor();
        for t in [30, 10, 20] {
            let message = Message::plain(format!("m{t}")).timestamp(t).finish().unwrap();
            store.append(message).await.unwrap();
        }

        let output = executor.run(COMMAND_LIST, Value::Null).await.unwrap();
        let values = drain(output).await;
        let timestamps: Vec<i64> = values.iter().map(|v| v["timestamp"].as_i64().unwrap()).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn list_honors_since_and_skips_expired() {
        let (executor, store, _) = executor();
        store
            .append(Message::plain("old").timestamp(10).finish().unwrap())
            .await
            .unwrap();
        store
            .append(Message::plain("new").timestamp(20).finish().unwrap())
            .await
            .unwrap();
        store
            .append(
                Message::plain("stale")
                    .timestamp(30)
                    .expires_at(40)
                    .finish()
                    .unwrap(),
            )
            .await
            .unwrap();

        let output = executor
            .run(COMMAND_LIST, json!({"since": 10}))
            .await
            .unwrap();
        let values = drain(output).await;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["body"], "new");
    }

    #[tokio::test]
    async fn post_attaches_route_signature_and_stores() {
        let (executor, store, identity) = executor();
        let message = Message::plain("hi").finish().unwrap();
        let args = json!({ "message": message });

        let output = executor.run(COMMAND_POST, args).await.unwrap();
        let values = drain(output).await;
        let stored: Message = serde_json::from_value(values[0].clone()).unwrap();
        assert_eq!(stored.meta.signed.len(), 1);
        assert_eq!(stored.meta.signed[0].public_key, identity.public_key_hex());
        assert_eq!(stored.meta.signed[0].kind, Some(SignatureKind::Route));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn post_is_idempotent_and_returns_the_stored_copy() {
        let (executor, store, _) = executor();
        let message = Message::plain("hi").finish().unwrap();

        executor
            .run(COMMAND_POST, json!({ "message": message }))
            .await
            .unwrap();
        let output = executor
            .run(COMMAND_POST, json!({ "message": message }))
            .await
            .unwrap();
        let values = drain(output).await;
        let stored: Message = serde_json::from_value(values[0].clone()).unwrap();
        // The stored copy keeps its original route signature; nothing was
        // appended twice.
        assert_eq!(stored.meta.signed.len(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn info_reports_identity_and_version() {
        let (executor, _, identity) = executor();
        let output = executor.run(COMMAND_INFO, Value::Null).await.unwrap();
        let values = drain(output).await;
        assert_eq!(values[0]["public_key"], identity.public_key_hex());
        assert_eq!(values[0]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let (executor, _, _) = executor();
        let result = executor.run("destroy", Value::Null).await;
        assert!(matches!(
            result,
            Err(ExecutorError::UnknownCommand { .. })
        ));
    }
}
