//! Event reactor.
//!
//! # Data Flow
//! ```text
//! loop (until TerminationFlag raised):
//!     poll(timeout) → events
//!     listener token     → accept until would-block
//!     readable           → recv  → teardown? log + close_both
//!     writable           → send  → teardown? log + close_both
//!     read/write closed  → flush (bounded wait) → failed? log → close_both
//! exit:
//!     BridgeManager::destroy → drop Poll
//! ```
//!
//! # Design Decisions
//! - Runs on one dedicated thread; the bridge state is never shared
//! - Per-connection failures are logged and contained, only a failed
//!   readiness wait ends the loop with an error
//! - An interrupted wait is retried, not treated as failure

pub mod event_loop;

pub use event_loop::Reactor;
