//! Job queue on top of a [`JobStore`].

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::key::JobKeyCodec;
use crate::signal::WakeupSignal;
use crate::store::{JobStore, RedisStore};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stream of job ids produced by [`JobQueue::consume_jobs`].
pub type JobStream = BoxStream<'static, QueueResult<String>>;

/// Job queue backed by a list store with pub/sub wake-ups.
///
/// Producers call [`submit_job`](Self::submit_job); consumers drive the
/// stream returned by [`consume_jobs`](Self::consume_jobs). Any number of
/// consumers, in this process or others, may share one queue: the store's
/// atomic pop hands every entry to exactly one of them.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    codec: JobKeyCodec,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a queue over an existing store.
    pub fn new(store: Arc<dyn JobStore>, config: QueueConfig) -> Self {
        Self {
            codec: JobKeyCodec::new(config.key_prefix.clone()),
            store,
            config,
        }
    }

    /// Connect to Redis and create a queue.
    pub async fn connect(config: QueueConfig) -> QueueResult<Self> {
        info!("Initializing job queue: {}", config.queue_name);
        debug!(
            list = %config.list_key,
            channel = %config.channel,
            "Queue config"
        );

        let store = RedisStore::connect(&config.redis_url).await?;

        info!("Job queue '{}' ready", config.queue_name);
        Ok(Self::new(Arc::new(store), config))
    }

    /// Get the configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Submit a job.
    ///
    /// The entry is durable once the push returns. The wake-up publish that
    /// follows is best effort; consumers that miss it still find the job on
    /// their next timed poll. Submitting the same id twice queues it twice.
    pub async fn submit_job(&self, job_id: &str) -> QueueResult<()> {
        let key = self.codec.encode(job_id);
        self.store.push(&self.config.list_key, &key).await?;
        self.store.publish(&self.config.channel, "").await?;

        debug!(queue = %self.config.queue_name, job_id = %job_id, "Submitted job");
        Ok(())
    }

    /// Pop the next job id without waiting.
    pub async fn next_job(&self) -> QueueResult<Option<String>> {
        match self.store.pop(&self.config.list_key).await? {
            Some(key) => self.codec.decode(&key).map(Some),
            None => Ok(None),
        }
    }

    /// Number of pending entries.
    pub async fn len(&self) -> QueueResult<usize> {
        self.store.len(&self.config.list_key).await
    }

    /// Whether the queue has no pending entries.
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Consume jobs until `cancel` fires.
    ///
    /// The stream is lazy: it subscribes to the wake channel on first poll.
    /// When the list is empty it waits for a wake-up, bounded by the
    /// configured poll timeout, and polls again. Cancellation is checked once
    /// per iteration and also ends an idle wait; a store call already in
    /// flight is not interrupted. A store error is yielded once and ends the
    /// stream. Once ended, the stream keeps returning `None`.
    pub fn consume_jobs(&self, cancel: CancellationToken) -> JobStream {
        let consumer = Consumer {
            queue: self.clone(),
            cancel,
            signal: Arc::new(WakeupSignal::new()),
            listener: None,
            finished: false,
        };

        stream::unfold(consumer, |mut consumer| async move {
            let item = consumer.next().await?;
            Some((item, consumer))
        })
        .fuse()
        .boxed()
    }

    /// Forward every message on the wake channel into `signal`.
    async fn listen(&self, signal: Arc<WakeupSignal>) -> QueueResult<Listener> {
        let mut subscription = self.store.subscribe(&self.config.channel).await?;
        debug!(channel = %self.config.channel, "Listening for job notifications");

        let handle = tokio::spawn(async move {
            while subscription.recv().await.is_some() {
                signal.notify();
            }
        });

        Ok(Listener(handle))
    }
}

/// Stops the wake forwarding task when the consumer goes away.
struct Listener(JoinHandle<()>);

impl Drop for Listener {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// State behind one [`JobStream`].
struct Consumer {
    queue: JobQueue,
    cancel: CancellationToken,
    signal: Arc<WakeupSignal>,
    listener: Option<Listener>,
    finished: bool,
}

impl Consumer {
    async fn next(&mut self) -> Option<QueueResult<String>> {
        if self.finished {
            return None;
        }

        if self.listener.is_none() {
            match self.queue.listen(self.signal.clone()).await {
                Ok(listener) => self.listener = Some(listener),
                Err(e) => return self.fail(e),
            }
        }

        while !self.cancel.is_cancelled() {
            match self.queue.next_job().await {
                Ok(Some(job_id)) => return Some(Ok(job_id)),
                Ok(None) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = self.signal.wait(self.queue.config.poll_timeout) => {}
                    }
                }
                Err(e) => return self.fail(e),
            }
        }

        debug!(queue = %self.queue.config.queue_name, "Job consumer cancelled");
        self.finished = true;
        self.listener = None;
        None
    }

    fn fail(&mut self, error: QueueError) -> Option<QueueResult<String>> {
        warn!(queue = %self.queue.config.queue_name, error = %error, "Job consumer stopped");
        self.finished = true;
        self.listener = None;
        Some(Err(error))
    }
}
