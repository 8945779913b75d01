//! Error types for queue operations.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Redis error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Store backend error (non-Redis backends)
    #[error("Store error: {0}")]
    Store(String),

    /// A popped entry did not carry the configured job key prefix
    #[error("Invalid job key: {0}")]
    InvalidJobKey(String),

    /// Subscribing to the wake channel failed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Job handler returned an error
    #[error("Job handler failed: {0}")]
    Handler(String),

    /// Worker not running
    #[error("Worker not running")]
    WorkerNotRunning,

    /// Worker already running
    #[error("Worker already running")]
    WorkerAlreadyRunning,
}

impl QueueError {
    /// Whether the error came from the backing store rather than from local logic.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Redis(_) | Self::Store(_) | Self::Subscription(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_display() {
        let err = QueueError::InvalidJobKey("garbage".to_string());
        assert_eq!(err.to_string(), "Invalid job key: garbage");
    }

    #[test]
    fn test_store_error_classification() {
        assert!(QueueError::Store("down".into()).is_store_error());
        assert!(QueueError::Subscription("refused".into()).is_store_error());
        assert!(!QueueError::InvalidJobKey("x".into()).is_store_error());
        assert!(!QueueError::WorkerNotRunning.is_store_error());
    }
}
