//! Shutdown coordination for the server.

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Wraps a watch channel so a task that subscribes after the trigger still
/// observes it. Clones share the same signal.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Repeated calls are no-ops.
    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_late_subscriber_sees_trigger() {
        let shutdown = Shutdown::new();
        let mut early = shutdown.subscribe();
        shutdown.clone().trigger();
        shutdown.trigger();

        early.changed().await.unwrap();
        assert!(*early.borrow());
        assert!(*shutdown.subscribe().borrow());
        assert!(shutdown.is_triggered());
    }
}
