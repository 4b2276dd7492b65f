use chatsync_common::Message;
use chatsync_config::SeedData;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct FallbackEntry {
    seed: Vec<Message>,
    undelivered: Vec<Message>,
}

/// Last-resort, process-lifetime message source.
///
/// Holds the seed dataset plus every message whose remote delivery failed
/// during this session. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct FallbackStore {
    inner: Arc<RwLock<HashMap<String, FallbackEntry>>>,
}

impl FallbackStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: SeedData) -> Self {
        Self::new(seeds.into_conversations())
    }

    pub fn new(seeds: impl IntoIterator<Item = (String, Vec<Message>)>) -> Self {
        let entries = seeds
            .into_iter()
            .map(|(chat_id, seed)| {
                (chat_id, FallbackEntry { seed, undelivered: Vec::new() })
            })
            .collect();

        Self {
            inner: Arc::new(RwLock::new(entries)),
        }
    }

    /// Seed plus undelivered messages for a conversation, in insertion order
    pub async fn seed_for(&self, chat_id: &str) -> Vec<Message> {
        let entries = self.inner.read().await;
        match entries.get(chat_id) {
            Some(entry) => entry
                .seed
                .iter()
                .chain(entry.undelivered.iter())
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Record a message that failed remote delivery
    pub async fn append_undelivered(&self, chat_id: &str, message: Message) {
        let mut entries = self.inner.write().await;
        let entry = entries.entry(chat_id.to_string()).or_default();

        if entry.undelivered.iter().any(|m| m.id == message.id) {
            return;
        }
        debug!("Holding undelivered message {} for {}", message.id, chat_id);
        entry.undelivered.push(message);
    }

    /// Messages recorded after failed delivery only
    pub async fn undelivered(&self, chat_id: &str) -> Vec<Message> {
        self.inner
            .read()
            .await
            .get(chat_id)
            .map(|entry| entry.undelivered.clone())
            .unwrap_or_default()
    }

    /// Drop a message from the undelivered record once the remote has it
    pub async fn remove_undelivered(&self, chat_id: &str, message_id: &str) -> bool {
        let mut entries = self.inner.write().await;
        match entries.get_mut(chat_id) {
            Some(entry) => {
                let before = entry.undelivered.len();
                entry.undelivered.retain(|m| m.id != message_id);
                entry.undelivered.len() != before
            }
            None => false,
        }
    }

    /// Forget every undelivered message for a conversation; the seed stays
    pub async fn clear_undelivered(&self, chat_id: &str) {
        if let Some(entry) = self.inner.write().await.get_mut(chat_id) {
            entry.undelivered.clear();
        }
    }
}
