//! Single-threaded readiness loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use mio::event::Event;
use mio::{Events, Poll, Registry, Token};

use crate::config::ReactorConfig;
use crate::error::{BridgeError, ErrorCode, ProxyError};
use crate::lifecycle::TerminationFlag;
use crate::net::{BridgeManager, Endpoint};
use crate::observability::metrics;
use crate::observability::ProxyLog;

/// Owns the readiness multiplexer and dispatches its events to a `BridgeManager`.
pub struct Reactor {
    poll: Poll,
    events: Events,
    timeout: Duration,
    backend: Endpoint,
    log: Arc<dyn ProxyLog>,
}

impl Reactor {
    pub fn new(
        config: &ReactorConfig,
        backend: Endpoint,
        log: Arc<dyn ProxyLog>,
    ) -> Result<Self, ProxyError> {
        let poll = Poll::new().map_err(ProxyError::Multiplexer)?;
        Ok(Self {
            poll,
            events: Events::with_capacity(config.max_events.max(1)),
            timeout: Duration::from_millis(config.poll_timeout_ms),
            backend,
            log,
        })
    }

    /// Registry for handing to the `BridgeManager`.
    pub fn registry(&self) -> Result<Registry, ProxyError> {
        self.poll.registry().try_clone().map_err(ProxyError::Multiplexer)
    }

    /// Run until `terminate` is raised or waiting for readiness fails.
    ///
    /// The flag is checked once per iteration, so shutdown takes at most one
    /// poll timeout. Every bridge is closed and the multiplexer released
    /// before this returns.
    pub fn run(
        mut self,
        mut bridges: BridgeManager,
        terminate: &TerminationFlag,
    ) -> Result<(), ProxyError> {
        self.log.info("Database proxy server start.");

        let result = loop {
            if terminate.is_raised() {
                break Ok(());
            }

            if let Err(e) = self.poll.poll(&mut self.events, Some(self.timeout)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                self.log
                    .critical(&format!("Failed to wait for readiness events [{}].", e));
                break Err(ProxyError::Poll(e));
            }

            for event in self.events.iter() {
                self.dispatch(&mut bridges, event);
            }
        };

        let open = bridges.destroy();
        if open > 0 {
            self.log
                .debug(&format!("Closed [{}] bridges still open at shutdown.", open));
        }
        drop(bridges);
        result
    }

    fn dispatch(&self, bridges: &mut BridgeManager, event: &Event) {
        let token = event.token();
        if bridges.is_listener(token) {
            self.accept_all(bridges);
            return;
        }

        if event.is_readable() {
            let code = bridges.recv(token);
            if code.is_teardown() {
                self.on_recv_failure(bridges, token, code);
                return;
            }
        }

        if event.is_writable() {
            let code = bridges.send(token);
            if code.is_teardown() {
                self.on_send_failure(bridges, token, code);
                return;
            }
        }

        if event.is_read_closed() || event.is_write_closed() || event.is_error() {
            self.on_hangup(bridges, token, event);
        }
    }

    fn accept_all(&self, bridges: &mut BridgeManager) {
        loop {
            match bridges.accept(&self.backend) {
                Ok(Some(accepted)) => self.log.debug(&format!(
                    "Succeed to establish bridge [{}] for client [{}].",
                    accepted.bridge, accepted.client_info
                )),
                Ok(None) => break,
                Err(BridgeError::Accept(e)) => {
                    self.log
                        .critical(&format!("Failed to accept client connection [{}].", e));
                    break;
                }
                Err(e) => self.log.critical(&format!(
                    "Failed to establish bridge between client and backend [{}].",
                    e
                )),
            }
        }
    }

    fn on_recv_failure(&self, bridges: &mut BridgeManager, token: Token, code: ErrorCode) {
        let who = bridges.conn_info(token).map(|i| i.to_string()).unwrap_or_default();
        let mut reason = code.as_str();
        match code {
            ErrorCode::ReadError => self
                .log
                .error(&format!("Failed to read data from [{}].", who)),
            ErrorCode::SessionEof => {
                let flushed = bridges.flush(token);
                self.log
                    .debug(&format!("One side [{}] closed the session.", who));
                if self.report_flush(bridges, token, flushed) {
                    reason = flushed.as_str();
                }
            }
            _ => self
                .log
                .debug(&format!("Unknown error during read happened at [{}].", who)),
        }
        self.close(bridges, token, reason);
    }

    fn on_send_failure(&self, bridges: &mut BridgeManager, token: Token, code: ErrorCode) {
        self.report_write_failure(bridges, token, code);
        self.close(bridges, token, code.as_str());
    }

    fn on_hangup(&self, bridges: &mut BridgeManager, token: Token, event: &Event) {
        if !bridges.contains(token) {
            return;
        }
        // Input is still buffered behind a paused read; the EOF shows up through
        // recv once the peer drains.
        if bridges.is_read_paused(token) && !event.is_write_closed() && !event.is_error() {
            return;
        }

        let flushed = bridges.flush(token);
        if let Some(info) = bridges.conn_info(token) {
            self.log
                .debug(&format!("Shutdown connection with [{}].", info));
        }
        let reason = if self.report_flush(bridges, token, flushed) {
            flushed.as_str()
        } else {
            "hangup"
        };
        self.close(bridges, token, reason);
    }

    /// Log a failed drain toward `token`'s peer. Returns whether it failed.
    fn report_flush(&self, bridges: &BridgeManager, token: Token, code: ErrorCode) -> bool {
        if !code.is_teardown() {
            return false;
        }
        if let Some(peer) = bridges.peer(token) {
            self.report_write_failure(bridges, peer, code);
        }
        true
    }

    /// Log a write-side failure on `token`.
    fn report_write_failure(&self, bridges: &BridgeManager, token: Token, code: ErrorCode) {
        match code {
            ErrorCode::WriteError => {
                let who = bridges.conn_info(token).map(|i| i.to_string()).unwrap_or_default();
                self.log
                    .error(&format!("Failed to write data to [{}].", who));
            }
            ErrorCode::FilterBlock => {
                let client = bridges
                    .other_side_conn_info(token)
                    .map(|i| i.to_string())
                    .unwrap_or_default();
                self.log.error(&format!(
                    "Quota exceeded, blocked data from client [{}].",
                    client
                ));
            }
            _ => {
                let who = bridges.conn_info(token).map(|i| i.to_string()).unwrap_or_default();
                self.log
                    .debug(&format!("Unknown error during write happened at [{}].", who));
            }
        }
    }

    fn close(&self, bridges: &mut BridgeManager, token: Token, reason: &'static str) {
        if bridges.close_both(token) {
            metrics::record_bridge_closed(reason, bridges.bridge_count());
        }
    }
}
