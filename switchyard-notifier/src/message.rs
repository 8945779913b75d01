//! Job notification messages.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How a message payload is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// UTF-8 text frame
    Text,
    /// Binary frame
    Binary,
}

/// An immutable notification, cheap to clone and share across sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMessage {
    payload: Bytes,
    kind: PayloadKind,
}

impl JobMessage {
    /// Create a text message.
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            payload: Bytes::from(text.into()),
            kind: PayloadKind::Text,
        }
    }

    /// Create a binary message.
    pub fn binary<B: Into<Bytes>>(data: B) -> Self {
        Self {
            payload: data.into(),
            kind: PayloadKind::Binary,
        }
    }

    /// The raw payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The payload kind.
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// The payload as text, for text messages.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            PayloadKind::Text => std::str::from_utf8(&self.payload).ok(),
            PayloadKind::Binary => None,
        }
    }

    /// Check if this is a text message.
    pub fn is_text(&self) -> bool {
        self.kind == PayloadKind::Text
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<String> for JobMessage {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for JobMessage {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<&JobMessage> for tungstenite::Message {
    fn from(msg: &JobMessage) -> Self {
        match msg.kind {
            PayloadKind::Text => tungstenite::Message::Text(
                String::from_utf8_lossy(&msg.payload).into_owned().into(),
            ),
            PayloadKind::Binary => tungstenite::Message::Binary(msg.payload.clone()),
        }
    }
}

/// Who a message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Every registered client
    Broadcast,
    /// A single client, by id
    Client(String),
}

/// A message paired with its delivery mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Delivery mode
    pub delivery: Delivery,
    /// Message to deliver
    pub message: JobMessage,
}

impl Envelope {
    /// Address a message to every client.
    pub fn broadcast(message: impl Into<JobMessage>) -> Self {
        Self {
            delivery: Delivery::Broadcast,
            message: message.into(),
        }
    }

    /// Address a message to one client.
    pub fn to_client(client_id: impl Into<String>, message: impl Into<JobMessage>) -> Self {
        Self {
            delivery: Delivery::Client(client_id.into()),
            message: message.into(),
        }
    }
}
