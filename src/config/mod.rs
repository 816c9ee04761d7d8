//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, endpoint resolution)
//!     → ProxyConfig (validated, immutable)
//!     → handed to ProxyServer::bind
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BackendConfig;
pub use schema::FilterConfig;
pub use schema::ListenerConfig;
pub use schema::LoggingConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::ReactorConfig;
