mod engine;
mod fallback;
mod http_remote;


pub use engine::{DeliveryHandle, DeliveryStatus, SendReceipt, SnapshotStream, SyncEngine};
pub use fallback::FallbackStore;
pub use http_remote::HttpRemote;

use async_trait::async_trait;
use chatsync_common::{Error, Message, Result};

/// Trait for the remote source of truth
///
/// Every failure, including non-2xx responses and malformed bodies, is
/// reported as [`Error::Network`].
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Fetch the authoritative ordered list for a conversation
    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    /// Persist one message remotely
    async fn send_message(&self, chat_id: &str, message: &Message) -> Result<()>;
}

/// Remote used when no endpoint is configured; every call fails
pub struct OfflineRemote;

#[async_trait]
impl RemoteChannel for OfflineRemote {
    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        Err(Error::Network(format!("No remote configured for {}", chat_id)))
    }

    async fn send_message(&self, chat_id: &str, _message: &Message) -> Result<()> {
        Err(Error::Network(format!("No remote configured for {}", chat_id)))
    }
}
