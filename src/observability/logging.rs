//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (level, destination)
//! - Provide the four-level logger injected into the forwarding engine
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The engine sees only `ProxyLog`, never the global subscriber
//! - Log level configurable via config and environment (`RUST_LOG` wins)

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Leveled sink used by the reactor, bridge manager and quota filter.
pub trait ProxyLog: Send + Sync {
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn error(&self, msg: &str);
    fn critical(&self, msg: &str);
}

/// `ProxyLog` backed by the process-wide tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl TracingLog {
    pub fn shared() -> Arc<dyn ProxyLog> {
        Arc::new(TracingLog)
    }
}

impl ProxyLog for TracingLog {
    fn debug(&self, msg: &str) {
        tracing::debug!("{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
    }

    fn critical(&self, msg: &str) {
        tracing::error!(critical = true, "{}", msg);
    }
}

/// Install the global subscriber.
///
/// Writes to `config.path` when set, otherwise to stderr.
pub fn init_tracing(config: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("db_proxy={}", config.level)));

    if config.path.trim().is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.path.trim())?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    }

    Ok(())
}
