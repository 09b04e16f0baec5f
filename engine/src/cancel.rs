//! Scan-wide cancellation.
//!
//! One handle per scan, shared by the orchestrator, every worker, and every
//! in-flight tool runner. Cancellation is cooperative at job boundaries and
//! forceful at the runner (signal, grace, kill). Cancelling twice is a no-op.

use tokio::sync::watch;

/// Broadcast cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        // send_replace never fails even with no receivers.
        let _ = self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver for `tokio::select!` loops and tool runners.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::CancelHandle;

    #[test]
    fn cancel_is_idempotent_and_observable() {
        let handle = CancelHandle::new();
        let rx = handle.subscribe();
        assert!(!handle.is_cancelled());
        assert!(!*rx.borrow());

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(*rx.borrow());
    }

    #[test]
    fn clones_share_state() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        other.cancel();
        assert!(handle.is_cancelled());
    }
}
