//! Error types for notifier operations.

use thiserror::Error;

/// Notifier error type.
#[derive(Error, Debug)]
pub enum NotifierError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] tungstenite::Error),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Send error
    #[error("Failed to send message: {0}")]
    Send(String),
}

impl NotifierError {
    /// Whether the peer is gone, as opposed to a failed write on a live socket.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Protocol(e) => matches!(
                e,
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
            ),
            _ => false,
        }
    }
}

/// Result type for notifier operations.
pub type NotifierResult<T> = Result<T, NotifierError>;
