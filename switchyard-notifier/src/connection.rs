//! Client connection seam and the WebSocket-backed implementation.

use crate::error::{NotifierError, NotifierResult};
use crate::message::JobMessage;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

/// Close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is open and ready
    Open,
    /// A close frame has been sent
    Closing,
    /// Connection is closed
    Closed,
}

/// A live, bidirectional connection to one client.
///
/// Implementations must serialize their own writes: the notifier may call
/// `send` for the same connection from a broadcast and a targeted send at
/// once.
#[async_trait]
pub trait ClientConnection: Send + Sync {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Write one complete frame.
    async fn send(&self, message: &JobMessage) -> NotifierResult<()>;

    /// Send a close frame with `code` and `reason`.
    async fn close(&self, code: u16, reason: &str) -> NotifierResult<()>;
}

type Shared<T> = Arc<RwLock<T>>;

/// Write half of an upgraded WebSocket stream.
pub struct WsConnection<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, tungstenite::Message>>,
    state: Shared<ConnectionState>,
}

impl<S> WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Split an upgraded stream into a shareable connection and its reader.
    ///
    /// The reader must be driven for close frames from the peer to be seen.
    pub fn split(stream: WebSocketStream<S>) -> (Arc<Self>, ConnectionReader<S>) {
        let (sink, stream) = stream.split();
        let state = Arc::new(RwLock::new(ConnectionState::Open));

        let connection = Arc::new(Self {
            sink: Mutex::new(sink),
            state: Arc::clone(&state),
        });
        (connection, ConnectionReader { stream, state })
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

#[async_trait]
impl<S> ClientConnection for WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn send(&self, message: &JobMessage) -> NotifierResult<()> {
        if self.state() != ConnectionState::Open {
            return Err(NotifierError::ConnectionClosed);
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(tungstenite::Message::from(message)).await {
            tracing::debug!(error = %e, "WebSocket write failed");
            self.set_state(ConnectionState::Closed);
            return Err(NotifierError::Protocol(e));
        }
        Ok(())
    }

    async fn close(&self, code: u16, reason: &str) -> NotifierResult<()> {
        if self.state() == ConnectionState::Closed {
            return Ok(());
        }
        self.set_state(ConnectionState::Closing);

        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };

        let mut sink = self.sink.lock().await;
        let result = sink.send(tungstenite::Message::Close(Some(frame))).await;
        self.set_state(ConnectionState::Closed);

        match result {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(NotifierError::Protocol(e)),
        }
    }
}

/// Read half of a [`WsConnection`].
pub struct ConnectionReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    state: Shared<ConnectionState>,
}

impl<S> ConnectionReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Drain inbound frames until the peer goes away.
    ///
    /// Client frames carry nothing for the notifier and are discarded; pings
    /// are answered by tungstenite on the next write. The connection is
    /// marked closed when this returns.
    pub async fn run(mut self) -> NotifierResult<()> {
        let result = loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    tracing::debug!(?frame, "Peer closed connection");
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => break Ok(()),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket read failed");
                    break Err(NotifierError::Protocol(e));
                }
            }
        };

        *self.state.write() = ConnectionState::Closed;
        result
    }
}
