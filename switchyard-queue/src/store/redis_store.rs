//! Redis store backend.

use super::{JobStore, PubSubMessage, SUBSCRIPTION_BUFFER, Subscription};
use crate::error::{QueueError, QueueResult};
use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Job store backed by a Redis list and Redis pub/sub.
///
/// List commands share one multiplexed [`ConnectionManager`]; every
/// subscription gets its own pub/sub connection.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis server at `redis_url`.
    pub async fn connect(redis_url: &str) -> QueueResult<Self> {
        let client = Client::open(redis_url).map_err(|e| QueueError::Config(e.to_string()))?;
        let connection = ConnectionManager::new(client.clone()).await?;

        info!(url = %redis_url, "Connected to Redis job store");
        Ok(Self { client, connection })
    }
}

#[async_trait]
impl JobStore for RedisStore {
    async fn push(&self, list: &str, entry: &str) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.lpush(list, entry).await?;
        Ok(())
    }

    async fn pop(&self, list: &str) -> QueueResult<Option<String>> {
        let mut conn = self.connection.clone();
        let entry: Option<String> = conn.rpop(list, None).await?;
        Ok(entry)
    }

    async fn len(&self, list: &str) -> QueueResult<usize> {
        let mut conn = self.connection.clone();
        let len: usize = conn.llen(list).await?;
        Ok(len)
    }

    async fn publish(&self, channel: &str, payload: &str) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let receivers: u32 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers = receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> QueueResult<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let channel_name = channel.to_string();

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| QueueError::Subscription(e.to_string()))?;

        pubsub
            .subscribe(&channel_name)
            .await
            .map_err(|e| QueueError::Subscription(e.to_string()))?;

        info!(channel = %channel_name, "Subscribed to Redis channel");

        let channel_clone = channel_name.clone();
        let forwarder = tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        error!(error = %e, "Failed to get message payload");
                        continue;
                    }
                };

                let message = PubSubMessage {
                    channel: msg.get_channel_name().to_string(),
                    payload,
                };

                if tx.send(message).await.is_err() {
                    debug!(channel = %channel_clone, "Subscription receiver dropped");
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, channel_name).with_forwarder(forwarder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let result = RedisStore::connect("not a url").await;
        assert!(matches!(result, Err(QueueError::Config(_))));
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_list_is_fifo() {
        let store = RedisStore::connect("redis://localhost:6379").await.unwrap();
        let list = "switchyard:test:fifo";
        while store.pop(list).await.unwrap().is_some() {}

        store.push(list, "a").await.unwrap();
        store.push(list, "b").await.unwrap();

        assert_eq!(store.len(list).await.unwrap(), 2);
        assert_eq!(store.pop(list).await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.pop(list).await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.pop(list).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_publish_reaches_subscriber() {
        let store = RedisStore::connect("redis://localhost:6379").await.unwrap();
        let mut sub = store.subscribe("switchyard:test:wake").await.unwrap();

        store.publish("switchyard:test:wake", "").await.unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.channel, "switchyard:test:wake");
        assert_eq!(msg.payload, "");
    }
}
