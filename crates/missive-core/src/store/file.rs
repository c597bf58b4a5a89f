//! File-backed message store: a newline-delimited JSON log.
//!
//! One message per line, appended as inserts happen; the whole log is
//! loaded into memory at open. Good enough for a single-writer node;
//! the log is append-only by protocol, so there is no compaction to do.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use super::{MessageStore, StoreError};
use crate::message::Message;

/// Newline-delimited JSON log of messages.
pub struct FileStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl FileStore {
    /// Opens (or creates) a log file and loads its entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on unreadable files or undecodable lines.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines().filter(|line| !line.trim().is_empty()) {
                    let message: Message = serde_json::from_str(line)?;
                    let hash = message.meta.hash.clone().ok_or(StoreError::MissingHash)?;
                    if inner.index.contains_key(&hash) {
                        // First copy wins, matching append semantics.
                        continue;
                    }
                    let position = inner.messages.len();
                    inner.messages.push(message);
                    inner.index.insert(hash, position);
                }
                debug!(path = %path.display(), loaded = inner.messages.len(), "loaded message log");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
            Err(err) => return Err(err.into()),
        }

        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    async fn append_line(&self, message: &Message) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn exists(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.index.contains_key(hash))
    }

    async fn get(&self, hash: &str) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .index
            .get(hash)
            .map(|&position| inner.messages[position].clone()))
    }

    async fn append(&self, message: Message) -> Result<bool, StoreError> {
        let hash = message.meta.hash.clone().ok_or(StoreError::MissingHash)?;
        let mut inner = self.inner.write().await;
        if inner.index.contains_key(&hash) {
            return Ok(false);
        }
        self.append_line(&message).await?;
        let position = inner.messages.len();
        inner.messages.push(message);
        inner.index.insert(hash, position);
        Ok(true)
    }

    async fn list_since(&self, since: Option<i64>) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Message> = inner
            .messages
            .iter()
            .filter(|message| since.map_or(true, |watermark| message.timestamp > watermark))
            .cloned()
            .collect();
        matched.sort_by_key(|message| message.timestamp);
        Ok(matched)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.ndjson");

        let first = Message::plain("one").timestamp(1).finish().unwrap();
        let second = Message::plain("two").timestamp(2).finish().unwrap();
        {
            let store = FileStore::open(&path).await.unwrap();
            store.append(first.clone()).await.unwrap();
            store.append(second.clone()).await.unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        let hash = first.meta.hash.clone().unwrap();
        assert_eq!(reopened.get(&hash).await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn append_is_idempotent_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.ndjson");

        let message = Message::plain("one").timestamp(1).finish().unwrap();
        {
            let store = FileStore::open(&path).await.unwrap();
            assert!(store.append(message.clone()).await.unwrap());
        }
        let reopened = FileStore::open(&path).await.unwrap();
        assert!(!reopened.append(message).await.unwrap());
        assert_eq!(reopened.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/messages.ndjson");
        let store = FileStore::open(&path).await.unwrap();
        store
            .append(Message::plain("hi").finish().unwrap())
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
