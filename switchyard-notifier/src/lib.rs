//! # Switchyard Notifier
//!
//! Realtime fan-out of job notifications to connected clients.
//!
//! ## Features
//!
//! - Concurrent client registry keyed by client id
//! - Broadcast and targeted sends with per-client fault isolation
//! - Completion handles that resolve when a client is deregistered
//! - Graceful shutdown with a normal-closure frame
//! - WebSocket transport over tokio-tungstenite
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchyard_notifier::{JobMessage, Notifier, WsConnection};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let notifier = Arc::new(Notifier::new());
//!     let listener = TcpListener::bind("127.0.0.1:9000").await?;
//!
//!     let (tcp, addr) = listener.accept().await?;
//!     let stream = tokio_tungstenite::accept_async(tcp).await?;
//!     let (connection, reader) = WsConnection::split(stream);
//!
//!     let lifetime = notifier.register_client(connection, addr.to_string());
//!     tokio::spawn(reader.run());
//!
//!     notifier.broadcast_message(&JobMessage::text("job 42 done")).await;
//!     notifier.close_all_clients().await;
//!     lifetime.await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod config;
mod connection;
mod error;
mod lifetime;
mod message;
mod notifier;

pub use config::{DEFAULT_CLOSE_REASON, DEFAULT_SEND_TIMEOUT, NotifierConfig};
pub use connection::{
    ClientConnection, ConnectionReader, ConnectionState, NORMAL_CLOSURE, WsConnection,
};
pub use error::{NotifierError, NotifierResult};
pub use lifetime::ClientLifetime;
pub use message::{Delivery, Envelope, JobMessage, PayloadKind};
pub use notifier::{BroadcastReport, Notifier, SendOutcome};

// Re-export commonly used types from tungstenite
pub use tungstenite::Message as RawMessage;
pub use tungstenite::protocol::CloseFrame;
