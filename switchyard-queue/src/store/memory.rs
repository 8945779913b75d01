//! In-memory store for tests and single-process deployments.

use super::{JobStore, PubSubMessage, SUBSCRIPTION_BUFFER, Subscription};
use crate::error::QueueResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Process-local job store.
///
/// Cloning creates a new handle to the **same** lists and channels, so
/// producers and consumers in one process can share it like a Redis server.
/// Delivery to a subscriber whose buffer is full is dropped, mirroring the
/// at-most-once delivery of Redis pub/sub.
#[derive(Clone, Default)]
pub struct MemoryStore {
    lists: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
    subscribers: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<PubSubMessage>>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .lock()
            .get(channel)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn push(&self, list: &str, entry: &str) -> QueueResult<()> {
        self.lists
            .lock()
            .entry(list.to_string())
            .or_default()
            .push_front(entry.to_string());
        Ok(())
    }

    async fn pop(&self, list: &str) -> QueueResult<Option<String>> {
        Ok(self.lists.lock().get_mut(list).and_then(VecDeque::pop_back))
    }

    async fn len(&self, list: &str) -> QueueResult<usize> {
        Ok(self.lists.lock().get(list).map_or(0, VecDeque::len))
    }

    async fn publish(&self, channel: &str, payload: &str) -> QueueResult<()> {
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(channel) {
            senders.retain(|tx| {
                let message = PubSubMessage {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                };
                !matches!(tx.try_send(message), Err(TrySendError::Closed(_)))
            });
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> QueueResult<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx, channel.to_string()))
    }
}
