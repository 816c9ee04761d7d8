//! Endpoint and peer identity types.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Where a socket lives: an internet address or a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// IP address and port.
    Inet(SocketAddr),
    /// Unix domain socket path.
    Local(PathBuf),
}

impl Endpoint {
    /// Internet address, if this is an `Inet` endpoint.
    pub fn inet(&self) -> Option<SocketAddr> {
        match self {
            Endpoint::Inet(addr) => Some(*addr),
            Endpoint::Local(_) => None,
        }
    }

    /// Socket path, if this is a `Local` endpoint.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Endpoint::Inet(_) => None,
            Endpoint::Local(path) => Some(path),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inet(addr) => write!(f, "{}", addr),
            Endpoint::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Inet(addr)
    }
}

impl From<PathBuf> for Endpoint {
    fn from(path: PathBuf) -> Self {
        Endpoint::Local(path)
    }
}

/// Resolved identity of the remote end of one handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnInfo(Endpoint);

impl ConnInfo {
    pub fn new(endpoint: Endpoint) -> Self {
        Self(endpoint)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.0
    }
}

impl fmt::Display for ConnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
