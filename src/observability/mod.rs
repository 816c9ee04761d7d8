//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Reactor, bridges, quota filter:
//!     → logging.rs (ProxyLog: Debug / Info / Error / Critical)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr or log file
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The engine receives its logger explicitly, never through globals
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{ProxyLog, TracingLog};
