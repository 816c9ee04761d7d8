//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the database proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Public TCP listener.
    pub listener: ListenerConfig,

    /// Local socket of the database server.
    pub backend: BackendConfig,

    /// Quota enforcement on backend-bound traffic.
    pub filter: FilterConfig,

    /// Event loop tuning.
    pub reactor: ReactorConfig,

    /// Log level and destination.
    pub logging: LoggingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind, kept as text so a malformed value is reported rather than defaulted.
    pub port: String,

    /// Maximum concurrently open bridges.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "29017".to_string(),
            max_connections: 1024,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Path of the database server's Unix socket.
    pub socket_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/mongodb-27017.sock".to_string(),
        }
    }
}

/// Quota filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Enforce quotas on backend-bound writes.
    pub enabled: bool,

    /// Directory holding the database's data files.
    pub base_dir: String,

    /// Maximum number of data files; more than this blocks writes.
    pub quota_files: u64,

    /// Maximum aggregate data size in MiB; usage at or above this blocks writes.
    pub quota_data_size: u64,

    /// Seconds between file count scans.
    pub file_count_interval_secs: u64,

    /// Seconds between data size scans.
    pub data_size_interval_secs: u64,
}

impl FilterConfig {
    /// Data size limit in bytes.
    pub fn quota_data_size_bytes(&self) -> u64 {
        self.quota_data_size.saturating_mul(1024 * 1024)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_dir: "/var/lib/mongodb".to_string(),
            quota_files: 8,
            quota_data_size: 1024,
            file_count_interval_secs: 1,
            data_size_interval_secs: 5,
        }
    }
}

/// Event loop tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Upper bound on one readiness wait, in milliseconds.
    /// Shutdown latency is bounded by this value.
    pub poll_timeout_ms: u64,

    /// Events drained per readiness wait.
    pub max_events: usize,

    /// Bytes read per `read(2)` call.
    pub read_chunk_size: usize,

    /// Bytes queued toward one handle before reading from its peer pauses.
    pub max_pending_bytes: usize,

    /// Longest wait, in milliseconds, for a full socket while flushing a closing bridge.
    /// The reactor is blocked for that long, so keep it short.
    pub flush_timeout_ms: u64,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1000,
            max_events: 100,
            read_chunk_size: 16 * 1024,
            max_pending_bytes: 4 * 1024 * 1024,
            flush_timeout_ms: 2000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log file; empty means stderr.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: String::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
