//! Backing store for the queue: an atomic list plus literal-channel pub/sub.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::QueueResult;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffer size of a subscription's delivery channel.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 100;

/// A message delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    /// Channel name
    pub channel: String,
    /// Message payload
    pub payload: String,
}

/// The list and pub/sub operations a [`JobQueue`](crate::JobQueue) needs.
///
/// `pop` must be atomic across every client of the store: an entry is
/// returned to exactly one caller. Publishing is best effort and subscribers
/// may miss messages.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Push an entry onto the head of `list`.
    async fn push(&self, list: &str, entry: &str) -> QueueResult<()>;

    /// Pop an entry from the tail of `list`, or `None` when it is empty.
    async fn pop(&self, list: &str) -> QueueResult<Option<String>>;

    /// Number of entries in `list`.
    async fn len(&self, list: &str) -> QueueResult<usize>;

    /// Publish `payload` on `channel`.
    async fn publish(&self, channel: &str, payload: &str) -> QueueResult<()>;

    /// Subscribe to `channel` (exact name, no patterns).
    async fn subscribe(&self, channel: &str) -> QueueResult<Subscription>;
}

/// A subscription handle.
///
/// Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<PubSubMessage>,
    channel: String,
    forwarder: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::Receiver<PubSubMessage>, channel: String) -> Self {
        Self {
            receiver,
            channel,
            forwarder: None,
        }
    }

    /// Attach the task feeding this subscription so it is stopped on drop.
    pub(crate) fn with_forwarder(mut self, forwarder: JoinHandle<()>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Get the channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive the next message, or `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<PubSubMessage> {
        self.receiver.recv().await
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&mut self) -> Option<PubSubMessage> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
