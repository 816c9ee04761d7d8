//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use db_proxy::filter::QuotaFilter;
use db_proxy::observability::ProxyLog;
use db_proxy::{ProxyConfig, ProxyError, ProxyServer, Shutdown};
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Error,
    Critical,
}

/// Logger that keeps every line for assertions.
#[derive(Debug, Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingLog {
    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }

    fn push(&self, level: Level, msg: &str) {
        self.lines.lock().unwrap().push((level, msg.to_string()));
    }
}

impl ProxyLog for RecordingLog {
    fn debug(&self, msg: &str) {
        self.push(Level::Debug, msg);
    }

    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }

    fn critical(&self, msg: &str) {
        self.push(Level::Critical, msg);
    }
}

/// Config bound to an ephemeral loopback port with a short poll timeout.
pub fn test_config(socket: &Path) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = "0".into();
    config.backend.socket_path = socket.display().to_string();
    config.reactor.poll_timeout_ms = 100;
    config
}

/// Start a Unix-socket backend that hands every accepted connection to `handler`.
pub fn start_backend<F, Fut>(handler: F) -> (TempDir, PathBuf)
where
    F: Fn(UnixStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move { handler(socket).await });
        }
    });

    (dir, path)
}

/// Backend that echoes everything back.
pub fn start_echo_backend() -> (TempDir, PathBuf) {
    start_backend(|socket| async move {
        let (mut rd, mut wr) = socket.into_split();
        let _ = tokio::io::copy(&mut rd, &mut wr).await;
    })
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub log: Arc<RecordingLog>,
    pub filter: Arc<QuotaFilter>,
    pub handle: JoinHandle<Result<(), ProxyError>>,
}

impl RunningProxy {
    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(self) -> Result<(), ProxyError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("proxy did not stop")
            .expect("proxy task panicked")
    }
}

pub fn start_proxy(config: &ProxyConfig) -> RunningProxy {
    let log = Arc::new(RecordingLog::default());
    let server = ProxyServer::bind(config, log.clone()).unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown();
    let filter = server.filter();
    let handle = tokio::spawn(server.run());

    RunningProxy {
        addr,
        shutdown,
        log,
        filter,
        handle,
    }
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
