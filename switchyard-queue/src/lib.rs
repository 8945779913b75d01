//! Job queue for Switchyard.
//!
//! Producers push job ids onto a shared list and publish a wake-up on a
//! channel; consumers pop from the other end of the list. An idle consumer
//! does not busy-poll the store: it sleeps on a coalescing
//! [`WakeupSignal`] fed by the channel, with a timeout that covers
//! notifications lost in transit.
//!
//! - 📦 Redis-backed list and pub/sub ([`RedisStore`])
//! - 🧪 In-memory store for tests ([`MemoryStore`])
//! - 🔔 Single-slot wake-up signal
//! - 👷 Competing-consumer workers
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use switchyard_queue::{CancellationToken, JobQueue, MemoryStore, QueueConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), switchyard_queue::QueueError> {
//! let queue = JobQueue::new(Arc::new(MemoryStore::new()), QueueConfig::default());
//! queue.submit_job("render-42").await?;
//!
//! let mut jobs = queue.consume_jobs(CancellationToken::new());
//! assert_eq!(jobs.next().await.transpose()?, Some("render-42".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Queue Configuration
//!
//! ```
//! use switchyard_queue::QueueConfig;
//! use std::time::Duration;
//!
//! let config = QueueConfig::new("redis://localhost:6379", "renders")
//!     .with_key_prefix("render:")
//!     .with_poll_timeout(Duration::from_secs(2));
//!
//! assert_eq!(config.list_key, "switchyard:queue:renders");
//! assert_eq!(config.poll_timeout, Duration::from_secs(2));
//! ```
//!
//! ## With Redis
//!
//! ```no_run
//! use switchyard_queue::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QueueError> {
//!     let queue = JobQueue::connect(QueueConfig::from_env()).await?;
//!
//!     let mut worker = Worker::new(queue.clone(), |job_id| async move {
//!         println!("running {job_id}");
//!         Ok(())
//!     });
//!     worker.start()?;
//!
//!     queue.submit_job("render-42").await?;
//!     worker.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod queue;
pub mod signal;
pub mod store;
pub mod worker;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use key::JobKeyCodec;
pub use queue::{JobQueue, JobStream};
pub use signal::{Wake, WakeupSignal};
pub use store::{JobStore, MemoryStore, PubSubMessage, RedisStore, Subscription};
pub use worker::{JobHandler, Worker, WorkerConfig};

// Re-exported so callers don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::QueueConfig;
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::queue::{JobQueue, JobStream};
    pub use crate::store::{JobStore, MemoryStore, RedisStore};
    pub use crate::worker::{JobHandler, Worker, WorkerConfig};
    pub use tokio_util::sync::CancellationToken;
}
