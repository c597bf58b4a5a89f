//! In-memory message store, the reference implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MessageStore, StoreError};
use crate::message::Message;

/// In-memory append-only store.
///
/// Messages are held in insertion order with a hash index for O(1)
/// existence and lookup. `list_since` sorts on demand, since entries from
/// a sync round can arrive out of timestamp order.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
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

    async fn stored(body: &str, timestamp: i64) -> Message {
        Message::plain(body).timestamp(timestamp).finish().unwrap()
    }

    #[tokio::test]
    async fn append_is_idempotent_by_hash() {
        let store = MemoryStore::new();
        let message = stored("hi", 1).await;
        assert!(store.append(message.clone()).await.unwrap());
        assert!(!store.append(message.clone()).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_append_keeps_the_first_copy() {
        let store = MemoryStore::new();
        let mut original = stored("hi", 1).await;
        original
            .sign(&crate::identity::Identity::generate())
            .unwrap();
        store.append(original.clone()).await.unwrap();

        // Same content hash, no signatures: must not clobber the stored
        // signed copy.
        let bare = stored("hi", 1).await;
        assert_eq!(bare.meta.hash, original.meta.hash);
        store.append(bare).await.unwrap();

        let hash = original.meta.hash.clone().unwrap();
        let kept = store.get(&hash).await.unwrap().unwrap();
        assert_eq!(kept.meta.signed.len(), 1);
    }

    #[tokio::test]
    async fn list_since_is_exclusive_and_ordered() {
        let store = MemoryStore::new();
        for (body, t) in [("c", 30), ("a", 10), ("b", 20)] {
            store.append(stored(body, t).await).await.unwrap();
        }

        let all = store.list_since(None).await.unwrap();
        let timestamps: Vec<i64> = all.iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);

        let after = store.list_since(Some(20)).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].timestamp, 30);
    }

    #[tokio::test]
    async fn append_without_hash_is_rejected() {
        let store = MemoryStore::new();
        let mut message = stored("hi", 1).await;
        message.meta.hash = None;
        assert!(matches!(
            store.append(message).await.unwrap_err(),
            StoreError::MissingHash
        ));
    }
}
