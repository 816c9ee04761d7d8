//! Bridge identity and lifecycle state.
//!
//! # Responsibilities
//! - Generate unique bridge IDs for logs and metrics
//! - Track bridge state (Established → Closing → Closed)
//! - Name the two legs of a bridge

use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for bridge IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static BRIDGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeId(u64);

impl BridgeId {
    /// Generate a new unique bridge ID.
    pub fn new() -> Self {
        Self(BRIDGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for BridgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BridgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bridge-{}", self.0)
    }
}

/// Bridge state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Both handles open and registered for readiness.
    Established,
    /// Teardown decided; queued bytes are being flushed.
    Closing,
    /// Both handles released.
    Closed,
}

/// One side of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Socket accepted from a client.
    Client,
    /// Socket connected to the database server.
    Backend,
}

impl Leg {
    pub fn as_str(self) -> &'static str {
        match self {
            Leg::Client => "client",
            Leg::Backend => "backend",
        }
    }
}
