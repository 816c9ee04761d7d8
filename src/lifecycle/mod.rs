//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Quota filter → Reactor → Bridge manager → Listen
//!
//! Run:
//!     Reactor thread (blocking) + quota refreshers (async) + SIGTERM listener
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM → Shutdown::trigger → flag raised + broadcast
//!         → reactor exits within one poll timeout, refreshers exit on broadcast
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - One trigger reaches both the blocking loop (flag) and async tasks (broadcast)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, TerminationFlag};
pub use signals::spawn_termination_listener;
pub use startup::ProxyServer;
