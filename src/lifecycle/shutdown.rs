//! Stop coordination for the webhook process.

use tokio::sync::broadcast;

/// Broadcasts a single stop request to every long-running task.
///
/// Dropping the `Shutdown` also counts as a stop for subscribers, since
/// their `recv` then returns `Closed`.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request a stop. Subscribers that already exited are ignored.
    pub fn trigger(&self) {
        let receivers = self.tx.send(()).unwrap_or(0);
        tracing::debug!(receivers, "Stop requested");
    }

    /// Number of tasks still listening for the stop signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
