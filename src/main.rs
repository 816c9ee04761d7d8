//! Database proxy (v1)
//!
//! Forwards client TCP connections to a database server's local Unix socket
//! and refuses writes once the database directory exceeds its quota.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                 DATABASE PROXY                 │
//!                        │                                                │
//!   Client (TCP)         │  ┌──────────┐   ┌──────────────┐               │
//!   ─────────────────────┼─▶│ listener │──▶│    bridge    │───────────────┼──▶ Backend
//!   ◀────────────────────┼──│ (reactor)│◀──│   manager    │◀──────────────┼─── (Unix socket)
//!                        │  └──────────┘   └──────┬───────┘               │
//!                        │                        │ backend-bound bytes    │
//!                        │                        ▼                        │
//!                        │                 ┌──────────────┐  refreshers    │
//!                        │                 │ quota filter │◀── file count  │
//!                        │                 └──────────────┘◀── data size   │
//!                        │                                                │
//!                        │  config · logging · metrics · SIGTERM lifecycle │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use db_proxy::config::loader::load_config;
use db_proxy::observability::logging::init_tracing;
use db_proxy::observability::metrics::init_metrics;
use db_proxy::observability::TracingLog;
use db_proxy::ProxyServer;

#[derive(Parser, Debug)]
#[command(name = "db-proxy")]
#[command(about = "Transparent database proxy with disk quota enforcement", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/db-proxy.toml")]
    config: PathBuf,

    /// Override the configured log level (e.g. debug, info).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging)?;

    tracing::info!(
        config = %args.config.display(),
        listen = %format!("{}:{}", config.listener.host, config.listener.port),
        backend = %config.backend.socket_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let server = ProxyServer::bind(&config, TracingLog::shared())?;
    server.run().await?;

    Ok(())
}
