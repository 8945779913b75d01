//! Mapping between job ids and the keys stored in the queue list.

use crate::error::{QueueError, QueueResult};

/// Encodes job ids into queue entry keys and back.
///
/// Producers and consumers must agree on the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKeyCodec {
    prefix: String,
}

impl JobKeyCodec {
    /// Create a codec with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix prepended to every job id.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Turn a job id into the key pushed onto the list.
    pub fn encode(&self, job_id: &str) -> String {
        format!("{}{}", self.prefix, job_id)
    }

    /// Recover the job id from a popped key.
    pub fn decode(&self, key: &str) -> QueueResult<String> {
        key.strip_prefix(self.prefix.as_str())
            .map(str::to_string)
            .ok_or_else(|| QueueError::InvalidJobKey(key.to_string()))
    }
}

impl Default for JobKeyCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_JOB_KEY_PREFIX)
    }
}
