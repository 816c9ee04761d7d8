//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve the listen and backend endpoints
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::net::endpoint::Endpoint;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener host {0:?} is not an IP address")]
    InvalidHost(String),

    #[error("listener port {0:?} is not a valid port")]
    InvalidPort(String),

    #[error("listener.max_connections must be greater than zero")]
    NoConnections,

    #[error("backend.socket_path must not be empty")]
    EmptySocketPath,

    #[error("filter.base_dir must not be empty when the filter is enabled")]
    EmptyBaseDir,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("reactor.max_pending_bytes ({pending}) must be at least reactor.read_chunk_size ({chunk})")]
    PendingBelowChunk { pending: usize, chunk: usize },
}

/// Check the whole configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = listen_endpoint(config) {
        errors.push(e);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }
    if let Err(e) = backend_endpoint(config) {
        errors.push(e);
    }

    let filter = &config.filter;
    if filter.enabled {
        if filter.base_dir.trim().is_empty() {
            errors.push(ValidationError::EmptyBaseDir);
        }
        if filter.file_count_interval_secs == 0 {
            errors.push(ValidationError::Zero("filter.file_count_interval_secs"));
        }
        if filter.data_size_interval_secs == 0 {
            errors.push(ValidationError::Zero("filter.data_size_interval_secs"));
        }
    }

    let reactor = &config.reactor;
    if reactor.poll_timeout_ms == 0 {
        errors.push(ValidationError::Zero("reactor.poll_timeout_ms"));
    }
    if reactor.max_events == 0 {
        errors.push(ValidationError::Zero("reactor.max_events"));
    }
    if reactor.read_chunk_size == 0 {
        errors.push(ValidationError::Zero("reactor.read_chunk_size"));
    } else if reactor.max_pending_bytes < reactor.read_chunk_size {
        errors.push(ValidationError::PendingBelowChunk {
            pending: reactor.max_pending_bytes,
            chunk: reactor.read_chunk_size,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Resolve the public listen endpoint from `listener.host` and `listener.port`.
pub fn listen_endpoint(config: &ProxyConfig) -> Result<Endpoint, ValidationError> {
    let host = config.listener.host.trim();
    let ip: IpAddr = host
        .parse()
        .map_err(|_| ValidationError::InvalidHost(config.listener.host.clone()))?;
    let port: u16 = config
        .listener
        .port
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidPort(config.listener.port.clone()))?;
    Ok(Endpoint::Inet(SocketAddr::new(ip, port)))
}

/// Resolve the backend endpoint from `backend.socket_path`.
pub fn backend_endpoint(config: &ProxyConfig) -> Result<Endpoint, ValidationError> {
    let path = config.backend.socket_path.trim();
    if path.is_empty() {
        return Err(ValidationError::EmptySocketPath);
    }
    Ok(Endpoint::Local(PathBuf::from(path)))
}
