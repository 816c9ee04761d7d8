//! Quota filter subsystem.
//!
//! # Data Flow
//! ```text
//! Background (monitor.rs):
//!     interval tick → scan base_dir → store file_count / data_size
//!
//! Reactor thread (quota.rs):
//!     backend-bound write → check(len) → Allow | Block
//! ```
//!
//! # Design Decisions
//! - Measurement is periodic and amortized, the decision is a pair of atomic loads
//! - The client-bound leg is never checked

pub mod monitor;
pub mod quota;

pub use monitor::QuotaMonitor;
pub use quota::{QuotaFilter, QuotaState, Verdict};
