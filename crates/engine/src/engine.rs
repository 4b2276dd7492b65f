use crate::{FallbackStore, HttpRemote, OfflineRemote, RemoteChannel};
use chatsync_common::{
    now_millis, now_timestamp, Error, Message, MetricsProvider, NoOpMetrics, Result, Snapshot,
    Source, LOCAL_SENDER,
};
use chatsync_config::{AppConfig, SeedData, DEFAULT_KEY_PREFIX};
use chatsync_store::{FileStore, KeyValueStore, MessageCache};
use futures::Stream;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Two-phase view of a conversation: the cached list, then the reconciled one
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Snapshot> + Send>>;

/// Outcome of a remote delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// Held in the fallback store; still present in the cached list
    Undelivered,
}

/// Handle to a background delivery
#[derive(Debug)]
pub struct DeliveryHandle {
    message_id: String,
    inner: JoinHandle<DeliveryStatus>,
}

impl DeliveryHandle {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Wait for the delivery attempt to finish
    pub async fn wait(self) -> DeliveryStatus {
        match self.inner.await {
            Ok(status) => status,
            Err(e) => {
                warn!("Delivery task for {} failed: {}", self.message_id, e);
                DeliveryStatus::Undelivered
            }
        }
    }
}

/// Result of an optimistic send
#[derive(Debug)]
pub struct SendReceipt {
    pub message: Message,
    /// The published list including the new message
    pub messages: Vec<Message>,
    /// Set when the message could not be persisted and may not survive a restart
    pub cache_error: Option<Error>,
    pub delivery: DeliveryHandle,
}

/// Ids further ahead of the clock than this are not trusted for id seeding
const MAX_ID_AHEAD_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
struct LocalSend {
    seq: u64,
    message: Message,
    /// Latest fetch generation issued when the remote acknowledged the send
    confirmed_at: Option<u64>,
}

impl LocalSend {
    /// Whether a fetch (issued as generation `fetch_gen` after `fetch_seq`
    /// sends) may be missing this message.
    fn pending_for(&self, fetch_gen: u64, fetch_seq: u64) -> bool {
        match self.confirmed_at {
            None => true,
            Some(at) => self.seq > fetch_seq || at >= fetch_gen,
        }
    }
}

#[derive(Debug)]
struct ConversationState {
    messages: Vec<Message>,
    source: Source,
    /// Whether `messages` has been read from the cache at least once
    hydrated: bool,
    local: Vec<LocalSend>,
    send_seq: u64,
    fetch_gen: u64,
    applied_gen: u64,
    last_id_ms: i64,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            source: Source::Cache,
            hydrated: false,
            local: Vec::new(),
            send_seq: 0,
            fetch_gen: 0,
            applied_gen: 0,
            last_id_ms: 0,
        }
    }
}

impl ConversationState {
    fn hydrate(&mut self, cached: Vec<Message>) {
        self.messages = overlay_local(cached, &self.local, u64::MAX, u64::MAX);
        self.source = Source::Cache;
        self.hydrated = true;

        // Ids from an earlier session must not be reused
        let horizon = now_millis().saturating_add(MAX_ID_AHEAD_MS);
        let max = self
            .messages
            .iter()
            .filter_map(|m| m.id.parse::<i64>().ok())
            .filter(|id| *id <= horizon)
            .max();
        if let Some(max) = max {
            self.last_id_ms = self.last_id_ms.max(max);
        }
    }

    fn next_id(&mut self) -> String {
        let id = now_millis().max(self.last_id_ms.saturating_add(1));
        self.last_id_ms = id;
        id.to_string()
    }

    fn mark_delivered(&mut self, message_id: &str) {
        let fetch_gen = self.fetch_gen;
        if let Some(entry) = self.local.iter_mut().find(|e| e.message.id == message_id) {
            entry.confirmed_at = Some(fetch_gen);
        }
    }
}

/// Append local sends missing from `base`: every unconfirmed send, plus
/// confirmed sends the fetch may not have observed (issued after `fetch_seq`
/// or acknowledged after generation `fetch_gen` was issued).
fn overlay_local(
    mut base: Vec<Message>,
    local: &[LocalSend],
    fetch_gen: u64,
    fetch_seq: u64,
) -> Vec<Message> {
    let mut ids: HashSet<String> = base.iter().map(|m| m.id.clone()).collect();
    for entry in local {
        if entry.pending_for(fetch_gen, fetch_seq) && ids.insert(entry.message.id.clone()) {
            base.push(entry.message.clone());
        }
    }
    base
}

/// Reconciles the cache, the remote channel and the fallback store into one
/// published message list per conversation.
///
/// Operations on one conversation are serialized by a per-conversation lock;
/// different conversations never contend.
#[derive(Clone)]
pub struct SyncEngine {
    cache: MessageCache,
    remote: Arc<dyn RemoteChannel>,
    fallback: FallbackStore,
    metrics: Arc<dyn MetricsProvider>,
    sender: Arc<str>,
    conversations: Arc<Mutex<HashMap<String, Arc<Mutex<ConversationState>>>>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteChannel>,
        fallback: FallbackStore,
    ) -> Self {
        Self {
            cache: MessageCache::new(store, DEFAULT_KEY_PREFIX),
            remote,
            fallback,
            metrics: Arc::new(NoOpMetrics),
            sender: LOCAL_SENDER.into(),
            conversations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build an engine from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = FileStore::open(&config.cache.directory).await?;

        let remote: Arc<dyn RemoteChannel> = match &config.remote.base_url {
            Some(url) => Arc::new(HttpRemote::new(url, &config.remote)?),
            None => {
                info!("No remote configured, running offline");
                Arc::new(OfflineRemote)
            }
        };

        let seeds = SeedData::load(config.sync.seed_file.as_deref())?;

        Ok(Self::new(Arc::new(store), remote, FallbackStore::from_seeds(seeds))
            .with_key_prefix(&config.cache.key_prefix)
            .with_sender(&config.sync.local_sender))
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.cache = MessageCache::new(self.cache.store(), prefix);
        self
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    async fn conversation(&self, chat_id: &str) -> Arc<Mutex<ConversationState>> {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(chat_id.to_string())
            .or_default()
            .clone()
    }

    /// Load a conversation.
    ///
    /// The stream yields exactly two snapshots. The first comes from the
    /// cache without touching the network; the second is the reconciled
    /// list. The remote phase runs in its own task, so a result arriving
    /// after the stream is dropped still updates the cache but is never
    /// published.
    pub fn load_conversation(&self, chat_id: &str) -> SnapshotStream {
        let engine = self.clone();
        let chat_id = chat_id.to_string();

        Box::pin(async_stream::stream! {
            let (fast, fetch_gen, fetch_seq) = engine.load_cached(&chat_id).await;
            engine.metrics.record_load(Source::Cache).await;

            let (tx, rx) = oneshot::channel();
            let task_engine = engine.clone();
            let task_chat_id = chat_id.clone();
            tokio::spawn(async move {
                let snapshot = task_engine.reconcile(&task_chat_id, fetch_gen, fetch_seq).await;
                if tx.send(snapshot).is_err() {
                    debug!("Subscriber for {} went away before reconciliation", task_chat_id);
                }
            });

            yield fast;

            if let Ok(reconciled) = rx.await {
                engine.metrics.record_load(reconciled.source).await;
                yield reconciled;
            }
        })
    }

    async fn load_cached(&self, chat_id: &str) -> (Snapshot, u64, u64) {
        let conversation = self.conversation(chat_id).await;
        let mut state = conversation.lock().await;

        let cached = self.cache.read(chat_id).await;
        state.hydrate(cached);
        state.fetch_gen += 1;

        let snapshot = Snapshot::new(chat_id, Source::Cache, state.messages.clone());
        (snapshot, state.fetch_gen, state.send_seq)
    }

    async fn reconcile(&self, chat_id: &str, fetch_gen: u64, fetch_seq: u64) -> Snapshot {
        // No lock is held across the network call
        let result = self.remote.fetch_messages(chat_id).await;

        let conversation = self.conversation(chat_id).await;
        let mut state = conversation.lock().await;

        match result {
            Ok(remote) if !remote.is_empty() => {
                if fetch_gen <= state.applied_gen {
                    debug!("Discarding stale fetch for {} (gen {})", chat_id, fetch_gen);
                    return Snapshot::new(chat_id, state.source, state.messages.clone());
                }

                let merged = overlay_local(remote, &state.local, fetch_gen, fetch_seq);
                state.local.retain(|e| e.pending_for(fetch_gen, fetch_seq));
                state.applied_gen = fetch_gen;
                state.messages = merged;
                state.source = Source::Remote;

                if let Err(e) = self.cache.write(chat_id, &state.messages).await {
                    warn!("Failed to cache remote messages for {}: {}", chat_id, e);
                    self.metrics.record_error(e.error_type()).await;
                }

                debug!("Remote is authoritative for {}: {} messages", chat_id, state.messages.len());
                Snapshot::new(chat_id, Source::Remote, state.messages.clone())
            }
            Ok(_) => {
                debug!("Remote has no messages for {}, keeping local history", chat_id);
                self.settle_locally(chat_id, &mut state).await
            }
            Err(e) => {
                warn!("Remote fetch failed for {}: {}", chat_id, e);
                self.metrics.record_error(e.error_type()).await;
                self.settle_locally(chat_id, &mut state).await
            }
        }
    }

    /// Resolve without remote data: local history wins, the seed is the last resort
    async fn settle_locally(&self, chat_id: &str, state: &mut ConversationState) -> Snapshot {
        if !state.messages.is_empty() {
            return Snapshot::new(chat_id, state.source, state.messages.clone());
        }

        let seed = self.fallback.seed_for(chat_id).await;
        debug!("Using fallback for {}: {} messages", chat_id, seed.len());
        state.messages = seed;
        state.source = Source::Fallback;
        Snapshot::new(chat_id, Source::Fallback, state.messages.clone())
    }

    /// Send a message optimistically.
    ///
    /// The message is appended and persisted before this returns; remote
    /// delivery continues in the background. A delivery failure keeps the
    /// message in the list and records it in the fallback store.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> SendReceipt {
        let conversation = self.conversation(chat_id).await;
        let mut state = conversation.lock().await;

        if !state.hydrated {
            let cached = self.cache.read(chat_id).await;
            state.hydrate(cached);
        }

        let message = Message {
            id: state.next_id(),
            text: text.to_string(),
            sender: self.sender.to_string(),
            timestamp: now_timestamp(),
        };

        state.send_seq += 1;
        let seq = state.send_seq;
        state.local.push(LocalSend {
            seq,
            message: message.clone(),
            confirmed_at: None,
        });
        state.messages.push(message.clone());
        let messages = state.messages.clone();

        let cache_error = match self.cache.write(chat_id, &messages).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Message {} in {} may not survive a restart: {}", message.id, chat_id, e);
                self.metrics.record_error(e.error_type()).await;
                Some(e)
            }
        };
        drop(state);

        let delivery = self.spawn_delivery(chat_id, message.clone());

        SendReceipt {
            message,
            messages,
            cache_error,
            delivery,
        }
    }

    fn spawn_delivery(&self, chat_id: &str, message: Message) -> DeliveryHandle {
        let engine = self.clone();
        let chat_id = chat_id.to_string();
        let message_id = message.id.clone();

        let inner = tokio::spawn(async move { engine.deliver(&chat_id, message).await });

        DeliveryHandle { message_id, inner }
    }

    async fn deliver(&self, chat_id: &str, message: Message) -> DeliveryStatus {
        match self.remote.send_message(chat_id, &message).await {
            Ok(()) => {
                self.confirm(chat_id, &message.id).await;
                self.metrics.record_delivery(true).await;
                DeliveryStatus::Delivered
            }
            Err(e) => {
                warn!("Delivery of {} to {} failed: {}", message.id, chat_id, e);
                self.metrics.record_error(e.error_type()).await;
                self.metrics.record_delivery(false).await;
                self.fallback.append_undelivered(chat_id, message).await;
                DeliveryStatus::Undelivered
            }
        }
    }

    async fn confirm(&self, chat_id: &str, message_id: &str) {
        let conversation = self.conversation(chat_id).await;
        conversation.lock().await.mark_delivered(message_id);
    }

    /// Re-attempt delivery of messages held in the fallback store.
    ///
    /// Stops at the first failure and returns how many were delivered.
    pub async fn retry_undelivered(&self, chat_id: &str) -> usize {
        let mut delivered = 0;

        for message in self.fallback.undelivered(chat_id).await {
            match self.remote.send_message(chat_id, &message).await {
                Ok(()) => {
                    self.fallback.remove_undelivered(chat_id, &message.id).await;
                    self.confirm(chat_id, &message.id).await;
                    self.metrics.record_delivery(true).await;
                    delivered += 1;
                }
                Err(e) => {
                    warn!("Retry of {} to {} failed: {}", message.id, chat_id, e);
                    self.metrics.record_error(e.error_type()).await;
                    break;
                }
            }
        }

        delivered
    }

    /// Clear a conversation's local history, including messages still
    /// awaiting retry. Nothing is sent to the remote.
    pub async fn clear_conversation(&self, chat_id: &str) -> Result<()> {
        let conversation = self.conversation(chat_id).await;
        let mut state = conversation.lock().await;

        self.cache.clear(chat_id).await?;
        self.fallback.clear_undelivered(chat_id).await;

        let last_id_ms = state.last_id_ms;
        let fetch_gen = state.fetch_gen;
        let send_seq = state.send_seq;
        *state = ConversationState {
            hydrated: true,
            last_id_ms,
            fetch_gen,
            applied_gen: fetch_gen,
            send_seq,
            ..ConversationState::default()
        };

        info!("Cleared conversation {}", chat_id);
        Ok(())
    }

    /// The most recently published list for a conversation
    pub async fn current(&self, chat_id: &str) -> Vec<Message> {
        let conversation = self.conversation(chat_id).await;
        let state = conversation.lock().await;
        state.messages.clone()
    }
}
