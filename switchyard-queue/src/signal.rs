//! Coalescing wake-up signal used by idle consumers.

use std::time::Duration;
use tokio::sync::Notify;

/// How a [`WakeupSignal::wait`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A notification was pending or arrived while waiting
    Signalled,
    /// The timeout elapsed first
    TimedOut,
}

/// Single-slot, edge-triggered signal.
///
/// Notifying while a wake is already pending is a no-op, so any number of
/// notifications between two waits collapse into one. Waiting consumes the
/// pending wake.
#[derive(Debug, Default)]
pub struct WakeupSignal {
    notify: Notify,
}

impl WakeupSignal {
    /// Create a signal with no pending wake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Wakes the current waiter, or leaves one pending wake.
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    /// Consume a pending wake, or block until one arrives or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> Wake {
        match tokio::time::timeout(timeout, self.notify.notified()).await {
            Ok(()) => Wake::Signalled,
            Err(_) => Wake::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_notify() {
        let signal = WakeupSignal::new();
        assert_eq!(signal.wait(Duration::from_secs(5)).await, Wake::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_wake_is_consumed_immediately() {
        let signal = WakeupSignal::new();
        signal.notify();

        let started = tokio::time::Instant::now();
        assert_eq!(signal.wait(Duration::from_secs(5)).await, Wake::Signalled);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_coalesce() {
        let signal = WakeupSignal::new();
        signal.notify();
        signal.notify();
        signal.notify();

        assert_eq!(signal.wait(Duration::from_secs(1)).await, Wake::Signalled);
        assert_eq!(signal.wait(Duration::from_secs(1)).await, Wake::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_wakes_blocked_waiter() {
        let signal = Arc::new(WakeupSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait(Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.notify();

        assert_eq!(waiter.await.unwrap(), Wake::Signalled);
    }
}
