//! Notifier configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reason sent with the close frame on shutdown.
pub const DEFAULT_CLOSE_REASON: &str = "Closed";

/// Default bound on a single send or close.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Close reason used by `close_all_clients`
    #[serde(default = "default_close_reason")]
    pub close_reason: String,

    /// Upper bound on one write to a client; `None` waits indefinitely
    #[serde(with = "option_duration_ms", default = "default_send_timeout")]
    pub send_timeout: Option<Duration>,
}

fn default_close_reason() -> String {
    DEFAULT_CLOSE_REASON.to_string()
}

fn default_send_timeout() -> Option<Duration> {
    Some(DEFAULT_SEND_TIMEOUT)
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            close_reason: default_close_reason(),
            send_timeout: default_send_timeout(),
        }
    }
}

impl NotifierConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// `SWITCHYARD_CLOSE_REASON` and `SWITCHYARD_SEND_TIMEOUT_MS` (`0`
    /// disables the timeout).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(reason) = lookup("SWITCHYARD_CLOSE_REASON") {
            config = config.with_close_reason(reason);
        }

        if let Some(timeout) = lookup("SWITCHYARD_SEND_TIMEOUT_MS")
            && let Ok(ms) = timeout.parse::<u64>()
        {
            config.send_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        config
    }

    /// Set the close reason.
    pub fn with_close_reason(mut self, reason: impl Into<String>) -> Self {
        self.close_reason = reason.into();
        self
    }

    /// Set the send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Disable the send timeout.
    pub fn without_send_timeout(mut self) -> Self {
        self.send_timeout = None;
        self
    }
}

mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}
