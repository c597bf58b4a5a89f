//! Append-only, content-addressed message stores.
//!
//! A store never updates or deletes: it accepts new hashes and ignores
//! duplicates. That single rule is what makes log convergence idempotent:
//! any two peers that exchange their entries end up with the same set, and
//! locally attached signatures are never clobbered by a re-received copy.
//!
//! Backends:
//!
//! - [`MemoryStore`]: reference implementation, used by tests and
//!   short-lived clients.
//! - [`FileStore`]: newline-delimited JSON log for nodes that persist
//!   across restarts.
//!
//! [`open_store`] selects a backend from a URL-style config string.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::message::Message;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The message carries no content hash to key it by.
    #[error("message has no content hash")]
    MissingHash,

    /// The store URL names no known backend.
    #[error("unknown store scheme in '{url}'")]
    UnknownScheme {
        /// The rejected URL.
        url: String,
    },
}

/// Abstract contract of an append-only, content-addressed message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// True if a message with this hash has been stored.
    async fn exists(&self, hash: &str) -> Result<bool, StoreError>;

    /// Looks up a message by hash.
    async fn get(&self, hash: &str) -> Result<Option<Message>, StoreError>;

    /// Appends a message keyed by its content hash.
    ///
    /// Returns `true` if the message was newly inserted, `false` if the
    /// hash was already present (the stored copy is left untouched).
    async fn append(&self, message: Message) -> Result<bool, StoreError>;

    /// Messages with `timestamp` strictly greater than `since`, ordered by
    /// timestamp ascending. `None` returns the full log.
    async fn list_since(&self, since: Option<i64>) -> Result<Vec<Message>, StoreError>;

    /// Number of stored messages.
    async fn len(&self) -> Result<usize, StoreError>;
}

/// Opens a store from a URL-style config string.
///
/// Supported schemes: `memory:` and `file:<path>`.
///
/// # Errors
///
/// Returns [`StoreError::UnknownScheme`] for anything else, or I/O errors
/// from loading an existing file log.
pub async fn open_store(url: &str) -> Result<Arc<dyn MessageStore>, StoreError> {
    if url == "memory:" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    if let Some(path) = url.strip_prefix("file:") {
        return Ok(Arc::new(FileStore::open(path).await?));
    }
    Err(StoreError::UnknownScheme {
        url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_store_selects_backend_by_scheme() {
        assert!(open_store("memory:").await.is_ok());
        assert!(matches!(
            open_store("redis://nope").await,
            Err(StoreError::UnknownScheme { .. })
        ));
    }
}
