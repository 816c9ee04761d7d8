//! Error types shared by the forwarding engine.
//!
//! # Design Decisions
//! - Per-connection outcomes are a small closed enum (`ErrorCode`), not `io::Error`
//! - Only startup and readiness-wait failures surface as `ProxyError`
//! - Accept failures are reported per connection and never stop the reactor

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::validation::ValidationError;
use crate::net::endpoint::{ConnInfo, Endpoint};

/// Outcome of a single bridge read or write step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Bytes moved (or nothing to do).
    NoError,
    /// Read failed with an I/O error other than orderly close.
    ReadError,
    /// The peer performed an orderly close (zero-byte read).
    SessionEof,
    /// Read or write failed in a way we do not classify.
    UnknownError,
    /// Write failed hard.
    WriteError,
    /// The quota filter refused backend-bound bytes.
    FilterBlock,
    /// Only part of the queue was written; the rest waits for write readiness.
    PartialSkb,
}

impl ErrorCode {
    /// Whether this outcome ends the bridge.
    pub fn is_teardown(self) -> bool {
        !matches!(self, ErrorCode::NoError | ErrorCode::PartialSkb)
    }

    /// Stable label for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoError => "no_error",
            ErrorCode::ReadError => "read_error",
            ErrorCode::SessionEof => "session_eof",
            ErrorCode::UnknownError => "unknown_error",
            ErrorCode::WriteError => "write_error",
            ErrorCode::FilterBlock => "filter_block",
            ErrorCode::PartialSkb => "partial_skb",
        }
    }

    /// Classify a failed read.
    pub fn from_read_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut => ErrorCode::ReadError,
            _ => ErrorCode::UnknownError,
        }
    }

    /// Classify a failed write.
    pub fn from_write_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::WriteZero
            | io::ErrorKind::TimedOut => ErrorCode::WriteError,
            _ => ErrorCode::UnknownError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal errors: the proxy either never starts or stops running.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration failed semantic checks.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),

    /// The readiness multiplexer could not be created.
    #[error("failed to initialize readiness multiplexer: {0}")]
    Multiplexer(#[source] io::Error),

    /// Binding or registering the listening socket failed.
    #[error("failed to listen on {endpoint}: {source}")]
    Listen {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// Waiting for readiness failed in a way we cannot recover from.
    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),

    /// Installing the termination signal handler failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),

    /// The reactor thread panicked or was cancelled.
    #[error("reactor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure to pair one accepted client with the backend.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `accept(2)` itself failed.
    #[error("failed to accept client: {0}")]
    Accept(#[source] io::Error),

    /// The open bridge cap was reached; the client was dropped.
    #[error("rejected client {client}: {limit} bridges already open")]
    Capacity { client: ConnInfo, limit: usize },

    /// The backend endpoint cannot be reached over a local socket.
    #[error("backend endpoint {0} is not a local socket path")]
    UnsupportedBackend(Endpoint),

    /// Connecting to the backend failed; the client was closed.
    #[error("failed to connect client {client} to backend {}: {source}", .path.display())]
    Backend {
        client: ConnInfo,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Registering a new handle with the multiplexer failed.
    #[error("failed to register handle: {0}")]
    Register(#[source] io::Error),
}
