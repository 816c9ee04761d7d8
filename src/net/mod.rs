//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Client TCP connection
//!     → bridge.rs (accept, pair with a new backend Unix connection)
//!     → stream.rs (one readiness source over either socket kind)
//!     → connection.rs (bridge identity, Established → Closing → Closed)
//!
//! Per readiness event:
//!     readable → recv → queue toward peer → opportunistic send
//!     writable → send → quota check (backend leg) → write
//! ```
//!
//! # Design Decisions
//! - Bytes are forwarded untouched; no protocol is parsed
//! - The connection cap is checked before the backend is dialed
//! - Both legs of a bridge live and die together

pub mod bridge;
pub mod connection;
pub mod endpoint;
pub mod stream;

pub use bridge::{Accepted, BridgeLimits, BridgeManager, LISTENER};
pub use connection::{BridgeId, BridgeState, Leg};
pub use endpoint::{ConnInfo, Endpoint};
