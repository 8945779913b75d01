//! Queue configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default prefix prepended to job ids before they are stored in the list.
pub const DEFAULT_JOB_KEY_PREFIX: &str = "job:";

/// Default upper bound on how long an idle consumer waits before polling again.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Queue name
    pub queue_name: String,

    /// Key of the list holding queue entries
    pub list_key: String,

    /// Pub/sub channel used to wake consumers
    pub channel: String,

    /// Prefix used to encode job ids into queue entry keys
    pub key_prefix: String,

    /// Maximum time an idle consumer waits for a wake-up before polling
    #[serde(with = "duration_ms", default = "default_poll_timeout")]
    pub poll_timeout: Duration,
}

fn default_poll_timeout() -> Duration {
    DEFAULT_POLL_TIMEOUT
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REDIS_URL, "default")
    }
}

impl QueueConfig {
    /// Create a new queue configuration.
    ///
    /// The list key and wake channel are derived from the queue name so that
    /// two queues with different names never share entries.
    pub fn new(redis_url: impl Into<String>, queue_name: impl Into<String>) -> Self {
        let queue_name = queue_name.into();
        Self {
            redis_url: redis_url.into(),
            list_key: format!("switchyard:queue:{}", queue_name),
            channel: format!("switchyard:jobs:{}", queue_name),
            queue_name,
            key_prefix: DEFAULT_JOB_KEY_PREFIX.to_string(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `SWITCHYARD_REDIS_URL`
    /// - `SWITCHYARD_QUEUE_NAME`
    /// - `SWITCHYARD_QUEUE_KEY`
    /// - `SWITCHYARD_JOBS_CHANNEL`
    /// - `SWITCHYARD_JOB_KEY_PREFIX`
    /// - `SWITCHYARD_POLL_TIMEOUT_MS` (`0` is ignored)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let redis_url = lookup("SWITCHYARD_REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.into());
        let queue_name = lookup("SWITCHYARD_QUEUE_NAME").unwrap_or_else(|| "default".into());
        let mut config = Self::new(redis_url, queue_name);

        if let Some(key) = lookup("SWITCHYARD_QUEUE_KEY") {
            config = config.with_list_key(key);
        }

        if let Some(channel) = lookup("SWITCHYARD_JOBS_CHANNEL") {
            config = config.with_channel(channel);
        }

        if let Some(prefix) = lookup("SWITCHYARD_JOB_KEY_PREFIX") {
            config = config.with_key_prefix(prefix);
        }

        // A zero timeout would turn the idle wait into a busy poll.
        if let Some(timeout) = lookup("SWITCHYARD_POLL_TIMEOUT_MS")
            && let Ok(ms) = timeout.parse::<u64>()
            && ms > 0
        {
            config = config.with_poll_timeout(Duration::from_millis(ms));
        }

        config
    }

    /// Set the list key.
    pub fn with_list_key(mut self, key: impl Into<String>) -> Self {
        self.list_key = key.into();
        self
    }

    /// Set the wake channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the job key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
