//! Transparent database proxy library.
//!
//! Accepts clients on a public TCP address and bridges each one, byte for
//! byte, to the database server's local Unix socket. Backend-bound traffic
//! is refused once the database's on-disk usage exceeds the configured quota.

pub mod config;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reactor;

pub use config::schema::ProxyConfig;
pub use error::{ErrorCode, ProxyError};
pub use lifecycle::{ProxyServer, Shutdown};
