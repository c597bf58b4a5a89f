//! Client-driven log convergence: push, pull, and sync rounds.
//!
//! Two peers converge by exchanging `list` and `post` commands over any
//! [`Transport`]. Convergence is idempotent, not consensual: the log is an
//! append-only set keyed by content hash, so replaying a round can only
//! re-offer entries the other side already ignores.
//!
//! Per-remote watermarks make rounds incremental. A watermark advances
//! only after its round fully succeeds; an aborted round resumes from the
//! previous watermark on retry, at the cost of re-offering a few messages
//! the hash check will drop.
//!
//! Rounds against the same remote must not overlap: they read then update
//! a shared watermark. `Syncer` takes `&mut self` so a single client
//! serializes its rounds; coordinating multiple clients is out of scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::identity::Identity;
use crate::message::{Message, MessageError};
use crate::protocol::{
    signed_command, Event, ListArgs, Transport, TransportError, COMMAND_LIST, COMMAND_POST,
};
use crate::store::{MessageStore, StoreError};

/// Which side of the exchange a watermark tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// Messages fetched from the remote.
    Pull,
    /// Messages offered to the remote.
    Push,
}

/// Persistence contract for per-remote sync watermarks.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Last successfully synced watermark for a remote and direction.
    async fn bookmark(&self, remote: &str, direction: SyncDirection) -> Option<i64>;

    /// Records a new watermark after a successful round.
    async fn set_bookmark(&self, remote: &str, direction: SyncDirection, watermark: i64);
}

/// In-memory watermark store.
#[derive(Default)]
pub struct MemorySyncStore {
    inner: RwLock<HashMap<(String, SyncDirection), i64>>,
}

impl MemorySyncStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn bookmark(&self, remote: &str, direction: SyncDirection) -> Option<i64> {
        self.inner
            .read()
            .await
            .get(&(remote.to_string(), direction))
            .copied()
    }

    async fn set_bookmark(&self, remote: &str, direction: SyncDirection, watermark: i64) {
        self.inner
            .write()
            .await
            .insert((remote.to_string(), direction), watermark);
    }
}

/// Result of one push or pull round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Messages carried in this round: received on pull, acknowledged on
    /// push. Entries the receiving store already held still count; the
    /// hash-presence merge makes re-delivery expected, not erroneous.
    pub count: usize,
}

/// Result of a full sync round: push, then pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// The push half.
    pub push: SyncOutcome,
    /// The pull half.
    pub pull: SyncOutcome,
}

/// Errors that abort a sync round before its watermark is advanced.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport failed to deliver or stream.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A command could not be built or signed.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// A received payload was not a decodable message.
    #[error("undecodable payload from remote: {0}")]
    Decode(#[from] serde_json::Error),

    /// The remote rejected the command.
    #[error("remote rejected command ({status_code}): {message}")]
    Remote {
        /// The remote's reason.
        message: String,
        /// The remote's status code.
        status_code: u16,
    },

    /// The stream ended without a terminal event.
    #[error("result stream ended without a terminal event")]
    Truncated,
}

/// Client-side sync driver for one identity and one local log.
pub struct Syncer {
    identity: Identity,
    store: Arc<dyn MessageStore>,
    bookmarks: Arc<dyn SyncStore>,
}

impl Syncer {
    /// Creates a sync driver.
    pub fn new(
        identity: Identity,
        store: Arc<dyn MessageStore>,
        bookmarks: Arc<dyn SyncStore>,
    ) -> Self {
        Self {
            identity,
            store,
            bookmarks,
        }
    }

    /// Pulls the remote's log increment into the local store.
    ///
    /// Issues a signed `list` since the pull watermark, merges each
    /// received message by hash presence (pre-existing entries are left
    /// untouched, preserving locally attached signatures), and advances
    /// the watermark to the newest timestamp observed.
    ///
    /// # Errors
    ///
    /// Any [`SyncError`] aborts the round with the watermark unchanged.
    pub async fn pull(
        &mut self,
        remote: &str,
        transport: &dyn Transport,
    ) -> Result<SyncOutcome, SyncError> {
        let since = self.bookmarks.bookmark(remote, SyncDirection::Pull).await;
        let args = serde_json::to_value(ListArgs { since })?;
        let command = signed_command(&self.identity, COMMAND_LIST, args)?;

        let mut stream = transport.send(&command).await?;
        let mut count = 0usize;
        let mut newest: Option<i64> = None;
        let mut completed = false;

        while let Some(event) = stream.next().await {
            match event {
                Event::Data { payload } => {
                    let mut message: Message = serde_json::from_value(payload)?;
                    let hash = message.ensure_hash()?;
                    count += 1;
                    newest = Some(newest.map_or(message.timestamp, |t| t.max(message.timestamp)));
                    if !self.store.exists(&hash).await? {
                        self.store.append(message).await?;
                    }
                }
                Event::Error {
                    message,
                    status_code,
                } => {
                    return Err(SyncError::Remote {
                        message,
                        status_code,
                    })
                }
                Event::End => {
                    completed = true;
                    break;
                }
            }
        }
        if !completed {
            return Err(SyncError::Truncated);
        }

        if let Some(watermark) = newest {
            self.bookmarks
                .set_bookmark(remote, SyncDirection::Pull, watermark)
                .await;
        }
        debug!(remote, count, "pull round complete");
        Ok(SyncOutcome { count })
    }

    /// Pushes the local log increment to the remote.
    ///
    /// Issues one signed `post` per local message newer than the push
    /// watermark, counting acknowledged rounds. The remote's own
    /// hash-presence check makes re-offered messages harmless.
    ///
    /// # Errors
    ///
    /// Any [`SyncError`] aborts the round with the watermark unchanged;
    /// messages already acknowledged stay on the remote, and the retry
    /// re-offers them.
    pub async fn push(
        &mut self,
        remote: &str,
        transport: &dyn Transport,
    ) -> Result<SyncOutcome, SyncError> {
        let since = self.bookmarks.bookmark(remote, SyncDirection::Push).await;
        let pending = self.store.list_since(since).await?;

        let mut count = 0usize;
        let mut newest: Option<i64> = None;

        for message in pending {
            let timestamp = message.timestamp;
            let command = signed_command(
                &self.identity,
                COMMAND_POST,
                json!({ "message": message }),
            )?;
            let mut stream = transport.send(&command).await?;
            let mut completed = false;
            while let Some(event) = stream.next().await {
                match event {
                    Event::Data { .. } => {}
                    Event::Error {
                        message,
                        status_code,
                    } => {
                        return Err(SyncError::Remote {
                            message,
                            status_code,
                        })
                    }
                    Event::End => {
                        completed = true;
                        break;
                    }
                }
            }
            if !completed {
                return Err(SyncError::Truncated);
            }
            count += 1;
            newest = Some(newest.map_or(timestamp, |t| t.max(timestamp)));
        }

        if let Some(watermark) = newest {
            self.bookmarks
                .set_bookmark(remote, SyncDirection::Push, watermark)
                .await;
        }
        debug!(remote, count, "push round complete");
        Ok(SyncOutcome { count })
    }

    /// Runs push then pull.
    ///
    /// Push first so the following pull sees the just-pushed messages;
    /// the hash-presence merge counts them as re-received, never as
    /// duplicates to store.
    ///
    /// # Errors
    ///
    /// Propagates the first failing half; a failed push skips the pull.
    pub async fn sync(
        &mut self,
        remote: &str,
        transport: &dyn Transport,
    ) -> Result<SyncReport, SyncError> {
        let push = self.push(remote, transport).await?;
        let pull = self.pull(remote, transport).await?;
        Ok(SyncReport { push, pull })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bookmarks_are_scoped_by_remote_and_direction() {
        let store = MemorySyncStore::new();
        store.set_bookmark("alpha", SyncDirection::Pull, 10).await;
        store.set_bookmark("alpha", SyncDirection::Push, 20).await;

        assert_eq!(store.bookmark("alpha", SyncDirection::Pull).await, Some(10));
        assert_eq!(store.bookmark("alpha", SyncDirection::Push).await, Some(20));
        assert_eq!(store.bookmark("beta", SyncDirection::Pull).await, None);
    }
}
