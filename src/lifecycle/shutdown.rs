//! Shutdown coordination for the proxy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Loop-exit flag polled by the reactor once per iteration.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag(Arc<AtomicBool>);

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Coordinator for graceful shutdown.
///
/// Async tasks subscribe to the broadcast channel; the reactor thread, which
/// cannot await, watches the termination flag instead.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Raised together with the broadcast.
    flag: TerminationFlag,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            flag: TerminationFlag::new(),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Flag for the reactor loop.
    pub fn flag(&self) -> TerminationFlag {
        self.flag.clone()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.flag.raise();
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.is_raised()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
