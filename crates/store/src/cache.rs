use crate::kv::KeyValueStore;
use chatsync_common::{Message, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-conversation message cache over a key-value store.
///
/// Passive: it never merges or resolves conflicts, and callers serialize
/// their own writes per conversation.
#[derive(Clone)]
pub struct MessageCache {
    store: Arc<dyn KeyValueStore>,
    key_prefix: String,
}

impl MessageCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    /// Underlying key-value store
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    /// Storage key for a conversation
    pub fn key_for(&self, chat_id: &str) -> String {
        format!("{}{}", self.key_prefix, chat_id)
    }

    /// Read the cached list; missing, unreadable or malformed entries read as empty
    pub async fn read(&self, chat_id: &str) -> Vec<Message> {
        let key = self.key_for(chat_id);

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Cache read failed for {}: {}", chat_id, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                debug!("Cache hit for {}: {} messages", chat_id, messages.len());
                messages
            }
            Err(e) => {
                warn!("Ignoring malformed cache entry for {}: {}", chat_id, e);
                Vec::new()
            }
        }
    }

    /// Replace the cached list for a conversation
    pub async fn write(&self, chat_id: &str, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string(messages)?;
        self.store.set(&self.key_for(chat_id), &json).await
    }

    /// Remove the cached list for a conversation
    pub async fn clear(&self, chat_id: &str) -> Result<()> {
        self.store.remove(&self.key_for(chat_id)).await
    }
}
