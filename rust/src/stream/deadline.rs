//! Keepalive deadline shared between the stream client and its watchdog.
//!
//! Only the client writes the deadline. Handles get a [`DeadlineReader`] that
//! can observe expiry but not move it.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
struct DeadlineState {
    period: Duration,
    expires_at: Option<Instant>,
}

/// Writer side, owned by the stream client.
#[derive(Debug, Default)]
pub(crate) struct KeepaliveDeadline {
    state: Arc<RwLock<DeadlineState>>,
}

impl KeepaliveDeadline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reader(&self) -> DeadlineReader {
        DeadlineReader {
            state: Arc::clone(&self.state),
        }
    }

    /// Starts tracking a fresh connection with the server-declared period.
    pub(crate) fn arm(&self, period: Duration) {
        if let Ok(mut state) = self.state.write() {
            state.period = period;
            state.expires_at = Instant::now().checked_add(period);
        }
    }

    /// Pushes the deadline out by one period. No-op while disarmed.
    pub(crate) fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            if state.expires_at.is_some() {
                state.expires_at = Instant::now().checked_add(state.period);
            }
        }
    }

    pub(crate) fn disarm(&self) {
        if let Ok(mut state) = self.state.write() {
            state.expires_at = None;
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.reader().is_expired()
    }
}

/// Read-only view of a [`KeepaliveDeadline`].
#[derive(Clone, Debug)]
pub struct DeadlineReader {
    state: Arc<RwLock<DeadlineState>>,
}

impl DeadlineReader {
    /// True when a connection is live and no keepalive arrived in time.
    pub fn is_expired(&self) -> bool {
        self.state
            .read()
            .map(|state| {
                state
                    .expires_at
                    .is_some_and(|expires_at| Instant::now() > expires_at)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::KeepaliveDeadline;

    #[tokio::test(start_paused = true)]
    async fn expires_after_silence_longer_than_the_period() {
        let deadline = KeepaliveDeadline::new();
        deadline.arm(Duration::from_secs(10));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_reset_keeps_connection_alive() {
        let deadline = KeepaliveDeadline::new();
        let reader = deadline.reader();
        deadline.arm(Duration::from_secs(10));

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(8)).await;
            deadline.reset();
            assert!(!reader.is_expired());
        }
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(reader.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_deadline_never_expires() {
        let deadline = KeepaliveDeadline::new();
        assert!(!deadline.is_expired());

        deadline.arm(Duration::from_secs(1));
        deadline.disarm();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!deadline.reader().is_expired());

        deadline.reset();
        assert!(!deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_period_does_not_panic() {
        let deadline = KeepaliveDeadline::new();
        deadline.arm(Duration::MAX);
        deadline.reset();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!deadline.is_expired());
    }
}
