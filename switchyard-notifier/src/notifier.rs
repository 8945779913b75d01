//! Registry of connected clients and message fan-out.

use crate::config::NotifierConfig;
use crate::connection::{ClientConnection, ConnectionState, NORMAL_CLOSURE};
use crate::error::{NotifierError, NotifierResult};
use crate::lifetime::{ClientLifetime, Completion};
use crate::message::{Delivery, Envelope, JobMessage};
use dashmap::DashMap;
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of sending to one client.
#[derive(Debug)]
pub enum SendOutcome {
    /// The frame was written
    Delivered,
    /// No client is registered under the id
    NotFound,
    /// The connection was already closed; the client has been removed
    Closed,
    /// The write failed; the client has been removed
    Failed(NotifierError),
}

impl SendOutcome {
    /// Check if the message was delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Per-outcome counts for a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients the message was written to
    pub delivered: usize,
    /// Clients found closed and removed
    pub closed: usize,
    /// Clients whose write failed and were removed
    pub failed: usize,
}

impl BroadcastReport {
    /// Number of clients attempted.
    pub fn attempted(&self) -> usize {
        self.delivered + self.closed + self.failed
    }

    fn record(&mut self, outcome: &SendOutcome) {
        match outcome {
            SendOutcome::Delivered => self.delivered += 1,
            SendOutcome::Closed => self.closed += 1,
            SendOutcome::Failed(_) => self.failed += 1,
            SendOutcome::NotFound => {}
        }
    }
}

#[derive(Clone)]
struct ClientEntry {
    connection: Arc<dyn ClientConnection>,
    completion: Arc<Completion>,
}

/// Concurrent registry of realtime clients.
///
/// Share it behind an `Arc`; every operation takes `&self`. Sends to one
/// client never affect another: a closed or failing client is removed and
/// its [`ClientLifetime`] resolved, and the fan-out carries on.
pub struct Notifier {
    clients: DashMap<String, ClientEntry>,
    config: NotifierConfig,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Create a notifier with default configuration.
    pub fn new() -> Self {
        Self::with_config(NotifierConfig::default())
    }

    /// Create a notifier with custom configuration.
    pub fn with_config(config: NotifierConfig) -> Self {
        Self {
            clients: DashMap::new(),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Register a connection under `client_id`.
    ///
    /// If the id is already taken the newer connection replaces the old one
    /// and the old registration's lifetime resolves.
    pub fn register_client(
        &self,
        connection: Arc<dyn ClientConnection>,
        client_id: impl Into<String>,
    ) -> ClientLifetime {
        let client_id = client_id.into();
        let (completion, lifetime) = Completion::new(&client_id);

        let previous = self.clients.insert(
            client_id.clone(),
            ClientEntry {
                connection,
                completion,
            },
        );

        if let Some(previous) = previous {
            previous.completion.resolve();
            warn!(client_id = %client_id, "Client re-registered, previous connection released");
        } else {
            info!(client_id = %client_id, "Client registered");
        }

        lifetime
    }

    /// Remove a client and resolve its lifetime.
    ///
    /// Returns `false` if no client was registered under the id.
    pub fn unregister_client(&self, client_id: &str) -> bool {
        match self.clients.remove(client_id) {
            Some((_, entry)) => {
                entry.completion.resolve();
                info!(client_id = %client_id, "Client unregistered");
                true
            }
            None => false,
        }
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Ids of the registered clients.
    pub fn client_ids(&self) -> Vec<String> {
        self.clients.iter().map(|e| e.key().clone()).collect()
    }

    /// Check if a client is registered.
    pub fn contains_client(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Send to every registered client concurrently.
    ///
    /// Clients registered after the call starts are not included. Returns
    /// once every attempt has finished.
    pub async fn broadcast_message(&self, message: &JobMessage) -> BroadcastReport {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            debug!("Broadcast with no clients");
            return BroadcastReport::default();
        }

        let outcomes = join_all(
            snapshot
                .into_iter()
                .map(|(id, entry)| async move { self.send_to_entry(&id, entry, message).await }),
        )
        .await;

        let mut report = BroadcastReport::default();
        for outcome in &outcomes {
            report.record(outcome);
        }

        debug!(
            delivered = report.delivered,
            closed = report.closed,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    /// Send to a single client.
    pub async fn send_message_to_client(&self, client_id: &str, message: &JobMessage) -> SendOutcome {
        let Some(entry) = self.clients.get(client_id).map(|e| e.value().clone()) else {
            warn!(client_id = %client_id, "Client not found");
            return SendOutcome::NotFound;
        };

        self.send_to_entry(client_id, entry, message).await
    }

    /// Route an envelope by its delivery mode.
    ///
    /// A targeted send is reported as a one-client fan-out, so an unknown
    /// id yields an empty report.
    pub async fn dispatch(&self, envelope: &Envelope) -> BroadcastReport {
        match &envelope.delivery {
            Delivery::Broadcast => self.broadcast_message(&envelope.message).await,
            Delivery::Client(id) => {
                let mut report = BroadcastReport::default();
                report.record(&self.send_message_to_client(id, &envelope.message).await);
                report
            }
        }
    }

    /// Close every registered connection and empty the registry.
    ///
    /// Each connection gets a normal-closure frame with the configured
    /// reason; every lifetime resolves. Close failures are logged. Calling
    /// this again closes nothing. Returns the number of clients closed.
    pub async fn close_all_clients(&self) -> usize {
        let snapshot = self.snapshot();
        info!(clients = snapshot.len(), "Closing all clients");

        let reason = self.config.close_reason.as_str();
        join_all(snapshot.iter().map(|(id, entry)| async move {
            let result = self
                .bounded(entry.connection.close(NORMAL_CLOSURE, reason))
                .await;
            if let Err(e) = result {
                warn!(client_id = %id, error = %e, "Failed to close client connection");
            }
            entry.completion.resolve();
        }))
        .await;

        for (id, entry) in &snapshot {
            self.release(id, &entry.completion);
        }

        snapshot.len()
    }

    fn snapshot(&self) -> Vec<(String, ClientEntry)> {
        self.clients
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    async fn send_to_entry(&self, client_id: &str, entry: ClientEntry, message: &JobMessage) -> SendOutcome {
        if entry.connection.state() == ConnectionState::Closed {
            self.release(client_id, &entry.completion);
            warn!(client_id = %client_id, "Client connection closed, removed");
            return SendOutcome::Closed;
        }

        match self.bounded(entry.connection.send(message)).await {
            Ok(()) => {
                debug!(client_id = %client_id, bytes = message.len(), "Message sent");
                SendOutcome::Delivered
            }
            Err(e) if e.is_closed() => {
                self.release(client_id, &entry.completion);
                warn!(client_id = %client_id, "Client connection closed, removed");
                SendOutcome::Closed
            }
            Err(e) => {
                self.release(client_id, &entry.completion);
                error!(client_id = %client_id, error = %e, "Failed to send message, client removed");
                SendOutcome::Failed(e)
            }
        }
    }

    /// Apply the configured send timeout to a connection operation.
    async fn bounded<F>(&self, op: F) -> NotifierResult<()>
    where
        F: Future<Output = NotifierResult<()>>,
    {
        match self.config.send_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .unwrap_or(Err(NotifierError::Timeout)),
            None => op.await,
        }
    }

    /// Remove the entry only if it is still this registration, then resolve it.
    fn release(&self, client_id: &str, completion: &Arc<Completion>) {
        self.clients
            .remove_if(client_id, |_, current| Arc::ptr_eq(&current.completion, completion));
        completion.resolve();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockConnection {
        state: Mutex<Option<ConnectionState>>,
        sent: Mutex<Vec<JobMessage>>,
        closes: Mutex<Vec<(u16, String)>>,
        fail_sends: bool,
        fail_close: bool,
        delay: Option<Duration>,
    }

    impl MockConnection {
        fn open() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail_sends: true,
                ..Default::default()
            })
        }

        fn slow(delay: Duration, fail_sends: bool) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                fail_sends,
                ..Default::default()
            })
        }

        fn mark_closed(&self) {
            *self.state.lock() = Some(ConnectionState::Closed);
        }

        fn sent(&self) -> Vec<JobMessage> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl ClientConnection for MockConnection {
        fn state(&self) -> ConnectionState {
            self.state.lock().unwrap_or(ConnectionState::Open)
        }

        async fn send(&self, message: &JobMessage) -> NotifierResult<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_sends {
                return Err(NotifierError::Send("broken pipe".into()));
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }

        async fn close(&self, code: u16, reason: &str) -> NotifierResult<()> {
            self.closes.lock().push((code, reason.to_string()));
            self.mark_closed();
            if self.fail_close {
                return Err(NotifierError::Send("reset".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let notifier = Notifier::new();
        let _a = notifier.register_client(MockConnection::open(), "a");
        let _b = notifier.register_client(MockConnection::open(), "b");

        assert_eq!(notifier.client_count(), 2);
        assert!(notifier.contains_client("a"));
        let mut ids = notifier.client_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let notifier = Notifier::new();
        let a = MockConnection::open();
        let b = MockConnection::open();
        let _la = notifier.register_client(a.clone(), "a");
        let _lb = notifier.register_client(b.clone(), "b");

        let msg = JobMessage::text("job 1 done");
        let report = notifier.broadcast_message(&msg).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(a.sent(), vec![msg.clone()]);
        assert_eq!(b.sent(), vec![msg]);
    }

    #[tokio::test]
    async fn test_broadcast_with_no_clients() {
        let notifier = Notifier::new();
        let report = notifier.broadcast_message(&JobMessage::text("x")).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failing_client() {
        let notifier = Notifier::new();
        let good1 = MockConnection::open();
        let good2 = MockConnection::open();
        let _l1 = notifier.register_client(good1.clone(), "good1");
        let mut bad_lifetime = notifier.register_client(MockConnection::failing(), "bad");
        let _l2 = notifier.register_client(good2.clone(), "good2");

        let report = notifier.broadcast_message(&JobMessage::text("m")).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.attempted(), 3);
        assert_eq!(good1.sent().len(), 1);
        assert_eq!(good2.sent().len(), 1);
        assert!(!notifier.contains_client("bad"));
        assert!(bad_lifetime.is_ended());
    }

    #[tokio::test]
    async fn test_closed_client_is_removed_and_resolved() {
        let notifier = Notifier::new();
        let conn = MockConnection::open();
        let mut lifetime = notifier.register_client(conn.clone(), "c");
        conn.mark_closed();

        let outcome = notifier.send_message_to_client("c", &JobMessage::text("x")).await;

        assert!(matches!(outcome, SendOutcome::Closed));
        assert!(conn.sent().is_empty());
        assert!(!notifier.contains_client("c"));
        assert!(lifetime.is_ended());
    }

    #[tokio::test]
    async fn test_broadcast_counts_closed_clients() {
        let notifier = Notifier::new();
        let live1 = MockConnection::open();
        let live2 = MockConnection::open();
        let closed = MockConnection::open();
        closed.mark_closed();
        let _l1 = notifier.register_client(live1.clone(), "live1");
        let mut closed_lifetime = notifier.register_client(closed.clone(), "closed");
        let _l2 = notifier.register_client(live2.clone(), "live2");

        let report = notifier.broadcast_message(&JobMessage::text("x")).await;
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                closed: 1,
                failed: 0
            }
        );
        assert_eq!(live1.sent().len(), 1);
        assert_eq!(live2.sent().len(), 1);
        assert!(closed.sent().is_empty());
        assert!(!notifier.contains_client("closed"));
        assert!(closed_lifetime.is_ended());
        assert_eq!(notifier.client_count(), 2);
    }

    #[tokio::test]
    async fn test_send_to_unknown_client() {
        let notifier = Notifier::new();
        let outcome = notifier.send_message_to_client("ghost", &JobMessage::text("x")).await;
        assert!(matches!(outcome, SendOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_targeted_send_reaches_only_target() {
        let notifier = Notifier::new();
        let a = MockConnection::open();
        let b = MockConnection::open();
        let _la = notifier.register_client(a.clone(), "a");
        let _lb = notifier.register_client(b.clone(), "b");

        let outcome = notifier.send_message_to_client("b", &JobMessage::text("for b")).await;

        assert!(outcome.is_delivered());
        assert!(a.sent().is_empty());
        assert_eq!(b.sent(), vec![JobMessage::text("for b")]);
    }

    #[tokio::test]
    async fn test_failed_send_removes_client() {
        let notifier = Notifier::new();
        let mut lifetime = notifier.register_client(MockConnection::failing(), "c");

        let outcome = notifier.send_message_to_client("c", &JobMessage::text("x")).await;

        assert!(matches!(outcome, SendOutcome::Failed(NotifierError::Send(_))));
        assert!(!notifier.contains_client("c"));
        assert!(lifetime.is_ended());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_removes_client() {
        let notifier =
            Notifier::with_config(NotifierConfig::new().with_send_timeout(Duration::from_millis(100)));
        let _lifetime = notifier.register_client(MockConnection::slow(Duration::from_secs(60), false), "c");

        let outcome = notifier.send_message_to_client("c", &JobMessage::text("x")).await;

        assert!(matches!(outcome, SendOutcome::Failed(NotifierError::Timeout)));
        assert!(!notifier.contains_client("c"));
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let notifier = Notifier::new();
        let first = MockConnection::open();
        let second = MockConnection::open();

        let mut first_lifetime = notifier.register_client(first.clone(), "c");
        let mut second_lifetime = notifier.register_client(second.clone(), "c");

        assert!(first_lifetime.is_ended());
        assert!(!second_lifetime.is_ended());
        assert_eq!(notifier.client_count(), 1);

        notifier.send_message_to_client("c", &JobMessage::text("x")).await;
        assert!(first.sent().is_empty());
        assert_eq!(second.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_keeps_newer_registration() {
        let notifier = Arc::new(Notifier::new());
        let _old = notifier.register_client(MockConnection::slow(Duration::from_millis(50), true), "c");

        let sender = {
            let notifier = notifier.clone();
            tokio::spawn(async move { notifier.send_message_to_client("c", &JobMessage::text("x")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut newer = notifier.register_client(MockConnection::open(), "c");
        let outcome = sender.await.unwrap();

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(notifier.contains_client("c"));
        assert!(!newer.is_ended());
    }

    #[tokio::test]
    async fn test_close_all_clients() {
        let notifier = Notifier::new();
        let a = MockConnection::open();
        let b = MockConnection::open();
        let mut la = notifier.register_client(a.clone(), "a");
        let mut lb = notifier.register_client(b.clone(), "b");

        assert_eq!(notifier.close_all_clients().await, 2);

        assert_eq!(notifier.client_count(), 0);
        assert!(la.is_ended());
        assert!(lb.is_ended());
        assert_eq!(*a.closes.lock(), vec![(1000, "Closed".to_string())]);
        assert_eq!(*b.closes.lock(), vec![(1000, "Closed".to_string())]);
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let notifier = Notifier::new();
        let conn = MockConnection::open();
        let _lifetime = notifier.register_client(conn.clone(), "a");

        notifier.close_all_clients().await;
        assert_eq!(notifier.close_all_clients().await, 0);
        assert_eq!(conn.closes.lock().len(), 1);

        let report = notifier.broadcast_message(&JobMessage::text("late")).await;
        assert_eq!(report, BroadcastReport::default());
        assert!(conn.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_failure_still_resolves() {
        let notifier = Notifier::with_config(NotifierConfig::new().with_close_reason("Shutting down"));
        let conn = Arc::new(MockConnection {
            fail_close: true,
            ..Default::default()
        });
        let mut lifetime = notifier.register_client(conn.clone(), "a");

        notifier.close_all_clients().await;

        assert!(lifetime.is_ended());
        assert_eq!(notifier.client_count(), 0);
        assert_eq!(conn.closes.lock()[0].1, "Shutting down");
    }

    #[tokio::test]
    async fn test_unregister_resolves_lifetime() {
        let notifier = Notifier::new();
        let mut lifetime = notifier.register_client(MockConnection::open(), "a");

        assert!(notifier.unregister_client("a"));
        assert!(!notifier.unregister_client("a"));
        assert!(lifetime.is_ended());
    }

    #[tokio::test]
    async fn test_dropping_notifier_resolves_lifetimes() {
        let notifier = Notifier::new();
        let lifetime = notifier.register_client(MockConnection::open(), "a");
        drop(notifier);
        lifetime.await;
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_delivery() {
        let notifier = Notifier::new();
        let a = MockConnection::open();
        let b = MockConnection::open();
        let _la = notifier.register_client(a.clone(), "a");
        let _lb = notifier.register_client(b.clone(), "b");

        let report = notifier.dispatch(&Envelope::to_client("a", "only a")).await;
        assert_eq!(report.delivered, 1);

        let report = notifier.dispatch(&Envelope::broadcast("all")).await;
        assert_eq!(report.delivered, 2);

        let report = notifier.dispatch(&Envelope::to_client("ghost", "x")).await;
        assert_eq!(report.attempted(), 0);

        assert_eq!(a.sent().len(), 2);
        assert_eq!(b.sent().len(), 1);
    }
}
