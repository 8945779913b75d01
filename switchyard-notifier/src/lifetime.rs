//! Completion handles tying a registration to its caller.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Registry side of a completion handle.
pub(crate) struct Completion {
    sender: Mutex<Option<oneshot::Sender<()>>>,
}

impl Completion {
    pub(crate) fn new(client_id: &str) -> (Arc<Self>, ClientLifetime) {
        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
        });
        let lifetime = ClientLifetime {
            client_id: client_id.to_string(),
            receiver: rx,
            ended: false,
        };
        (completion, lifetime)
    }

    /// Resolve the handle. Returns `false` if it was already resolved.
    pub(crate) fn resolve(&self) -> bool {
        match self.sender.lock().take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Resolves once the client's registration ends.
///
/// A connection handler typically awaits this to keep the upgraded socket
/// alive for as long as the notifier holds it. It resolves exactly once:
/// on deregistration, on a failed or closed send, on shutdown, when a newer
/// registration takes over the id, or when the notifier is dropped.
#[derive(Debug)]
#[must_use = "the lifetime resolves when the client is deregistered"]
pub struct ClientLifetime {
    client_id: String,
    receiver: oneshot::Receiver<()>,
    ended: bool,
}

impl ClientLifetime {
    /// Id this lifetime was registered under.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Check without waiting whether the registration has ended.
    pub fn is_ended(&mut self) -> bool {
        if !self.ended && !matches!(self.receiver.try_recv(), Err(TryRecvError::Empty)) {
            self.ended = true;
        }
        self.ended
    }
}

impl Future for ClientLifetime {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.ended {
            return Poll::Ready(());
        }
        // A dropped sender means the registry is gone, which also ends the lifetime.
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(_) => {
                this.ended = true;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
