//! Connection bridge manager.
//!
//! # Responsibilities
//! - Own the listening socket and every bridged handle
//! - Pair each accepted client with a fresh backend connection
//! - Move bytes between the legs with per-handle outbound queues
//! - Classify every read/write outcome into an `ErrorCode`
//! - Gate backend-bound writes through the quota filter
//!
//! # Design Decisions
//! - Only the reactor thread touches this state, so nothing here is locked
//! - Tokens are never reused; a late event for a closed bridge finds nothing
//! - A bridge's two handles are always removed together
//! - Queued bytes toward a handle are bounded: at `max_pending_bytes` the
//!   other leg stops being read until the queue drains

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use mio::net::{TcpListener, UnixStream};
use mio::{Events, Interest, Poll, Registry, Token};

use crate::config::{ListenerConfig, ReactorConfig};
use crate::error::{BridgeError, ErrorCode, ProxyError};
use crate::filter::{QuotaFilter, Verdict};
use crate::net::connection::{BridgeId, BridgeState, Leg};
use crate::net::endpoint::{ConnInfo, Endpoint};
use crate::net::stream::Stream;
use crate::observability::metrics;
use crate::observability::ProxyLog;

/// Token of the listening socket.
pub const LISTENER: Token = Token(0);

/// Sizing knobs for the bridge manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeLimits {
    /// Maximum concurrently open bridges.
    pub max_bridges: usize,
    /// Bytes read per `read(2)` call.
    pub read_chunk_size: usize,
    /// Bytes queued toward one handle before its peer stops being read.
    pub max_pending_bytes: usize,
    /// Longest wait for a full socket while draining a closing bridge.
    pub flush_timeout: Duration,
}

impl BridgeLimits {
    pub fn from_config(listener: &ListenerConfig, reactor: &ReactorConfig) -> Self {
        Self {
            max_bridges: listener.max_connections,
            read_chunk_size: reactor.read_chunk_size,
            max_pending_bytes: reactor.max_pending_bytes,
            flush_timeout: Duration::from_millis(reactor.flush_timeout_ms),
        }
    }
}

impl Default for BridgeLimits {
    fn default() -> Self {
        Self::from_config(&ListenerConfig::default(), &ReactorConfig::default())
    }
}

/// A freshly paired client and backend.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub bridge: BridgeId,
    pub client: Token,
    pub backend: Token,
    pub client_info: ConnInfo,
}

/// One registered handle.
#[derive(Debug)]
struct Conn {
    stream: Stream,
    leg: Leg,
    bridge: BridgeId,
    peer: Token,
    info: ConnInfo,
    /// Bytes waiting to be written to this handle.
    outbound: BytesMut,
    interest: Interest,
    read_paused: bool,
}

#[derive(Debug)]
struct Bridge {
    client: Token,
    backend: Token,
    state: BridgeState,
}

/// Owner of all socket state on the reactor thread.
pub struct BridgeManager {
    registry: Registry,
    listener: Option<TcpListener>,
    conns: HashMap<Token, Conn>,
    bridges: HashMap<BridgeId, Bridge>,
    filter: Arc<QuotaFilter>,
    log: Arc<dyn ProxyLog>,
    limits: BridgeLimits,
    next_token: usize,
    read_buf: Vec<u8>,
}

impl BridgeManager {
    /// `registry` must belong to the reactor's poll instance.
    pub fn new(
        registry: Registry,
        filter: Arc<QuotaFilter>,
        log: Arc<dyn ProxyLog>,
        limits: BridgeLimits,
    ) -> Self {
        Self {
            registry,
            listener: None,
            conns: HashMap::new(),
            bridges: HashMap::new(),
            filter,
            log,
            read_buf: vec![0; limits.read_chunk_size.max(1)],
            limits,
            next_token: LISTENER.0 + 1,
        }
    }

    /// Bind `endpoint` and register it for accept readiness.
    ///
    /// Returns the bound address, which differs from `endpoint` when port 0 was asked for.
    pub fn listen(&mut self, endpoint: &Endpoint) -> Result<SocketAddr, ProxyError> {
        let listen_err = |source: io::Error| ProxyError::Listen {
            endpoint: endpoint.clone(),
            source,
        };

        let addr = endpoint.inet().ok_or_else(|| {
            listen_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "listen endpoint must be an internet address",
            ))
        })?;

        let mut listener = TcpListener::bind(addr).map_err(listen_err)?;
        self.registry
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(listen_err)?;
        let local = listener.local_addr().map_err(listen_err)?;

        self.listener = Some(listener);
        Ok(local)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn is_listener(&self, token: Token) -> bool {
        token == LISTENER
    }

    /// Accept one pending client and pair it with a new backend connection.
    ///
    /// Returns `Ok(None)` when no client is waiting. On any error the client
    /// socket has already been closed and no bridge exists.
    pub fn accept(&mut self, backend: &Endpoint) -> Result<Option<Accepted>, BridgeError> {
        let Some(listener) = self.listener.as_ref() else {
            return Ok(None);
        };

        let (client, peer_addr) = loop {
            match listener.accept() {
                Ok(pair) => break pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BridgeError::Accept(e)),
            }
        };
        let client_info = ConnInfo::new(Endpoint::Inet(peer_addr));

        if self.bridges.len() >= self.limits.max_bridges {
            return Err(BridgeError::Capacity {
                client: client_info,
                limit: self.limits.max_bridges,
            });
        }

        let path = backend
            .local_path()
            .ok_or_else(|| BridgeError::UnsupportedBackend(backend.clone()))?;
        let upstream = UnixStream::connect(path).map_err(|source| BridgeError::Backend {
            client: client_info.clone(),
            path: path.to_path_buf(),
            source,
        })?;

        // Latency matters more than segment count for query traffic.
        if let Err(e) = client.set_nodelay(true) {
            self.log.debug(&format!(
                "Failed to disable Nagle for client [{}] [{}].",
                client_info, e
            ));
        }

        let mut client = Stream::Tcp(client);
        let mut upstream = Stream::Unix(upstream);
        let client_token = self.allocate_token();
        let backend_token = self.allocate_token();

        self.registry
            .register(&mut client, client_token, Interest::READABLE)
            .map_err(BridgeError::Register)?;
        if let Err(e) = self
            .registry
            .register(&mut upstream, backend_token, Interest::READABLE)
        {
            let _ = self.registry.deregister(&mut client);
            return Err(BridgeError::Register(e));
        }

        let id = BridgeId::new();
        self.conns.insert(
            client_token,
            Conn {
                stream: client,
                leg: Leg::Client,
                bridge: id,
                peer: backend_token,
                info: client_info.clone(),
                outbound: BytesMut::new(),
                interest: Interest::READABLE,
                read_paused: false,
            },
        );
        self.conns.insert(
            backend_token,
            Conn {
                stream: upstream,
                leg: Leg::Backend,
                bridge: id,
                peer: client_token,
                info: ConnInfo::new(backend.clone()),
                outbound: BytesMut::new(),
                interest: Interest::READABLE,
                read_paused: false,
            },
        );
        self.bridges.insert(
            id,
            Bridge {
                client: client_token,
                backend: backend_token,
                state: BridgeState::Established,
            },
        );
        metrics::record_bridge_opened(self.bridges.len());

        Ok(Some(Accepted {
            bridge: id,
            client: client_token,
            backend: backend_token,
            client_info,
        }))
    }

    /// Read what `token` has available and queue it toward its peer.
    ///
    /// Reads until the socket would block, EOF, an error, or the queue toward
    /// the peer reaches the pending bound. Whatever was read is then pushed to
    /// the peer right away; if that push fails, the peer is armed for write
    /// readiness so the failure is classified by `send` on the peer's own event.
    pub fn recv(&mut self, token: Token) -> ErrorCode {
        let peer = match self.conns.get(&token) {
            Some(conn) if !conn.read_paused => conn.peer,
            _ => return ErrorCode::NoError,
        };

        let mut received = 0usize;
        let mut code = ErrorCode::NoError;
        loop {
            let queued = self.conns.get(&peer).map_or(0, |p| p.outbound.len());
            if queued >= self.limits.max_pending_bytes {
                if let Some(conn) = self.conns.get_mut(&token) {
                    conn.read_paused = true;
                }
                break;
            }

            let Some(conn) = self.conns.get_mut(&token) else {
                break;
            };
            match conn.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    code = ErrorCode::SessionEof;
                    break;
                }
                Ok(n) => {
                    received += n;
                    if let Some(peer_conn) = self.conns.get_mut(&peer) {
                        peer_conn.outbound.extend_from_slice(&self.read_buf[..n]);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    code = ErrorCode::from_read_error(&e);
                    break;
                }
            }
        }

        if received > 0 && self.send(peer).is_teardown() {
            self.arm_write(peer);
        }
        code
    }

    /// Drain the queue destined for `token`.
    pub fn send(&mut self, token: Token) -> ErrorCode {
        let Some(conn) = self.conns.get_mut(&token) else {
            return ErrorCode::NoError;
        };

        let mut code = ErrorCode::NoError;
        if !conn.outbound.is_empty() {
            if conn.leg == Leg::Backend
                && self.filter.check(conn.outbound.len()) == Verdict::Block
            {
                metrics::record_filter_block();
                return ErrorCode::FilterBlock;
            }

            let mut written = 0usize;
            while !conn.outbound.is_empty() {
                match conn.stream.write(&conn.outbound[..]) {
                    Ok(0) => {
                        code = ErrorCode::WriteError;
                        break;
                    }
                    Ok(n) => {
                        conn.outbound.advance(n);
                        written += n;
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        code = ErrorCode::PartialSkb;
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        code = ErrorCode::from_write_error(&e);
                        break;
                    }
                }
            }
            if written > 0 {
                metrics::record_bytes_forwarded(conn.leg, written);
            }
        }
        if code.is_teardown() {
            return code;
        }

        let pending = conn.outbound.len();
        let peer = conn.peer;
        if self.set_write_interest(token, pending > 0).is_err() {
            return ErrorCode::UnknownError;
        }
        if pending < self.limits.max_pending_bytes {
            self.resume_reading(peer);
        }
        code
    }

    /// Identity of the remote end of `token`.
    pub fn conn_info(&self, token: Token) -> Option<ConnInfo> {
        self.conns.get(&token).map(|c| c.info.clone())
    }

    /// Identity of the remote end of the other handle in `token`'s bridge.
    pub fn other_side_conn_info(&self, token: Token) -> Option<ConnInfo> {
        let peer = self.conns.get(&token)?.peer;
        self.conn_info(peer)
    }

    /// Drain the bytes queued toward `token`'s peer before teardown.
    ///
    /// Marks the bridge `Closing`. Backend-bound bytes still go through the
    /// quota check; a refusal is reported as `FilterBlock` and nothing is
    /// written. When the peer's socket is full, this waits for write readiness
    /// on that handle alone, for at most `flush_timeout`. Bytes left after the
    /// deadline are dropped and reported as `PartialSkb`.
    pub fn flush(&mut self, token: Token) -> ErrorCode {
        let Some((peer, id)) = self.conns.get(&token).map(|c| (c.peer, c.bridge)) else {
            return ErrorCode::NoError;
        };
        if let Some(bridge) = self.bridges.get_mut(&id) {
            bridge.state = BridgeState::Closing;
        }

        let Some(conn) = self.conns.get_mut(&peer) else {
            return ErrorCode::NoError;
        };
        if conn.outbound.is_empty() {
            return ErrorCode::NoError;
        }
        if conn.leg == Leg::Backend
            && self.filter.check(conn.outbound.len()) == Verdict::Block
        {
            metrics::record_filter_block();
            return ErrorCode::FilterBlock;
        }

        let deadline = Instant::now() + self.limits.flush_timeout;
        let mut waiter: Option<(Poll, Events)> = None;
        let mut written = 0usize;
        let mut code = ErrorCode::NoError;
        while !conn.outbound.is_empty() {
            match conn.stream.write(&conn.outbound[..]) {
                Ok(0) => {
                    code = ErrorCode::WriteError;
                    break;
                }
                Ok(n) => {
                    conn.outbound.advance(n);
                    written += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        code = ErrorCode::PartialSkb;
                        break;
                    }
                    if waiter.is_none() {
                        match Self::park_for_write(&self.registry, conn, peer) {
                            Ok(parked) => waiter = Some(parked),
                            Err(e) => {
                                self.log.debug(&format!(
                                    "Failed to wait for [{}] to drain [{}].",
                                    conn.info, e
                                ));
                                code = ErrorCode::PartialSkb;
                                break;
                            }
                        }
                    }
                    if let Some((poll, events)) = waiter.as_mut() {
                        match poll.poll(events, Some(remaining)) {
                            Ok(()) => {}
                            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                            Err(_) => {
                                code = ErrorCode::PartialSkb;
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    code = ErrorCode::from_write_error(&e);
                    break;
                }
            }
        }

        // Hand the handle back to the reactor's registry.
        if let Some((poll, _)) = waiter {
            let _ = poll.registry().deregister(&mut conn.stream);
            let _ = self.registry.register(&mut conn.stream, peer, conn.interest);
        }
        if written > 0 {
            metrics::record_bytes_forwarded(conn.leg, written);
        }
        if !conn.outbound.is_empty() {
            self.log.debug(&format!(
                "Dropped [{}] unflushed bytes toward [{}].",
                conn.outbound.len(),
                conn.info
            ));
        }
        code
    }

    /// Move `conn` onto a private poll that only reports its write readiness.
    fn park_for_write(
        registry: &Registry,
        conn: &mut Conn,
        token: Token,
    ) -> io::Result<(Poll, Events)> {
        let poll = Poll::new()?;
        registry.deregister(&mut conn.stream)?;
        if let Err(e) = poll
            .registry()
            .register(&mut conn.stream, token, Interest::WRITABLE)
        {
            let _ = registry.register(&mut conn.stream, token, conn.interest);
            return Err(e);
        }
        Ok((poll, Events::with_capacity(1)))
    }

    /// Token of the other handle in `token`'s bridge.
    pub fn peer(&self, token: Token) -> Option<Token> {
        self.conns.get(&token).map(|c| c.peer)
    }

    /// Tear down the whole bridge containing `token`.
    ///
    /// Returns `false` when `token` no longer belongs to any bridge.
    pub fn close_both(&mut self, token: Token) -> bool {
        let Some(id) = self.conns.get(&token).map(|c| c.bridge) else {
            return false;
        };
        let Some(mut bridge) = self.bridges.remove(&id) else {
            return false;
        };

        bridge.state = BridgeState::Closing;
        for t in [bridge.client, bridge.backend] {
            if let Some(mut conn) = self.conns.remove(&t) {
                let _ = self.registry.deregister(&mut conn.stream);
            }
        }
        bridge.state = BridgeState::Closed;
        true
    }

    /// Close the listener and every open bridge.
    ///
    /// Returns the number of bridges that were still open.
    pub fn destroy(&mut self) -> usize {
        if let Some(mut listener) = self.listener.take() {
            let _ = self.registry.deregister(&mut listener);
        }

        let open: Vec<Token> = self.bridges.values().map(|b| b.client).collect();
        let count = open.len();
        for token in open {
            self.close_both(token);
        }
        count
    }

    /// Lifecycle state of the bridge holding `token`; `Closed` once untracked.
    pub fn bridge_state(&self, token: Token) -> BridgeState {
        self.conns
            .get(&token)
            .and_then(|c| self.bridges.get(&c.bridge))
            .map_or(BridgeState::Closed, |b| b.state)
    }

    /// Bytes queued toward `token`.
    pub fn pending_bytes(&self, token: Token) -> usize {
        self.conns.get(&token).map_or(0, |c| c.outbound.len())
    }

    /// Whether reading from `token` is paused by the pending bound.
    pub fn is_read_paused(&self, token: Token) -> bool {
        self.conns.get(&token).is_some_and(|c| c.read_paused)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.conns.contains_key(&token)
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    fn allocate_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn set_write_interest(&mut self, token: Token, on: bool) -> io::Result<()> {
        let Some(conn) = self.conns.get_mut(&token) else {
            return Ok(());
        };
        let wanted = if on {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        if wanted != conn.interest {
            self.registry.reregister(&mut conn.stream, token, wanted)?;
            conn.interest = wanted;
        }
        Ok(())
    }

    /// Force a write-readiness event for `token`, even if already armed.
    fn arm_write(&mut self, token: Token) {
        let Some(conn) = self.conns.get_mut(&token) else {
            return;
        };
        let wanted = Interest::READABLE | Interest::WRITABLE;
        if self.registry.reregister(&mut conn.stream, token, wanted).is_ok() {
            conn.interest = wanted;
        }
    }

    /// Lift a read pause. Re-registering re-arms the edge so buffered input is reported again.
    fn resume_reading(&mut self, token: Token) {
        let Some(conn) = self.conns.get_mut(&token) else {
            return;
        };
        if !conn.read_paused {
            return;
        }
        conn.read_paused = false;
        let _ = self.registry.reregister(&mut conn.stream, token, conn.interest);
    }
}

impl Drop for BridgeManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::observability::logging::testing::RecordingLog;
    use std::io::{Read as _, Write as _};
    use std::os::unix::net::{UnixListener as StdUnixListener, UnixStream as StdUnixStream};
    use std::path::PathBuf;
    use std::thread;

    struct Harness {
        _poll: Poll,
        _dir: tempfile::TempDir,
        mgr: BridgeManager,
        addr: SocketAddr,
        backend: Endpoint,
        server: StdUnixListener,
    }

    fn harness(filter: FilterConfig, limits: BridgeLimits) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let sock: PathBuf = dir.path().join("db.sock");
        let server = StdUnixListener::bind(&sock).unwrap();

        let poll = Poll::new().unwrap();
        let mut mgr = BridgeManager::new(
            poll.registry().try_clone().unwrap(),
            Arc::new(QuotaFilter::new(&filter)),
            Arc::new(RecordingLog::default()),
            limits,
        );
        let addr = mgr
            .listen(&Endpoint::Inet("127.0.0.1:0".parse().unwrap()))
            .unwrap();

        Harness {
            _poll: poll,
            _dir: dir,
            mgr,
            addr,
            backend: Endpoint::Local(sock),
            server,
        }
    }

    fn blocking_filter() -> FilterConfig {
        FilterConfig {
            enabled: true,
            quota_data_size: 0,
            ..FilterConfig::default()
        }
    }

    fn accept_one(h: &mut Harness) -> Result<Accepted, BridgeError> {
        for _ in 0..200 {
            if let Some(accepted) = h.mgr.accept(&h.backend)? {
                return Ok(accepted);
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no client arrived");
    }

    fn pair(h: &mut Harness) -> (std::net::TcpStream, Accepted, StdUnixStream) {
        let client = std::net::TcpStream::connect(h.addr).unwrap();
        let accepted = accept_one(h).unwrap();
        let (upstream, _) = h.server.accept().unwrap();
        (client, accepted, upstream)
    }

    /// Call `recv` until it reports something other than "nothing yet".
    fn recv_until(
        h: &mut Harness,
        token: Token,
        done: impl Fn(&BridgeManager, ErrorCode) -> bool,
    ) -> ErrorCode {
        for _ in 0..400 {
            let code = h.mgr.recv(token);
            if done(&h.mgr, code) {
                return code;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition never met");
    }

    #[test]
    fn accept_pairs_client_with_backend() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (client, accepted, _upstream) = pair(&mut h);

        assert_eq!(h.mgr.bridge_count(), 1);
        assert_eq!(h.mgr.bridge_state(accepted.client), BridgeState::Established);
        assert_eq!(h.mgr.bridge_state(accepted.backend), BridgeState::Established);

        let client_info = h.mgr.conn_info(accepted.client).unwrap();
        assert_eq!(client_info.endpoint(), &Endpoint::Inet(client.local_addr().unwrap()));
        assert_eq!(client_info, accepted.client_info);

        let backend_info = h.mgr.conn_info(accepted.backend).unwrap();
        assert_eq!(backend_info.endpoint(), &h.backend);

        assert_eq!(h.mgr.other_side_conn_info(accepted.backend), Some(client_info.clone()));
        assert_eq!(h.mgr.other_side_conn_info(accepted.client), Some(backend_info.clone()));
        assert_ne!(client_info, backend_info);
    }

    #[test]
    fn unreachable_backend_closes_client() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        h.backend = Endpoint::Local(PathBuf::from("/nonexistent/db.sock"));

        let mut client = std::net::TcpStream::connect(h.addr).unwrap();
        let err = accept_one(&mut h).unwrap_err();
        assert!(matches!(err, BridgeError::Backend { .. }));
        assert_eq!(h.mgr.bridge_count(), 0);

        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn capacity_limit_rejects_extra_clients() {
        let limits = BridgeLimits {
            max_bridges: 1,
            ..BridgeLimits::default()
        };
        let mut h = harness(FilterConfig::default(), limits);
        let (_client, _accepted, _upstream) = pair(&mut h);

        let _second = std::net::TcpStream::connect(h.addr).unwrap();
        let err = accept_one(&mut h).unwrap_err();
        assert!(matches!(err, BridgeError::Capacity { limit: 1, .. }));
        assert_eq!(h.mgr.bridge_count(), 1);
    }

    #[test]
    fn forwards_both_directions() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (mut client, accepted, mut upstream) = pair(&mut h);

        client.write_all(b"ping").unwrap();
        upstream.set_nonblocking(true).unwrap();
        let mut got = Vec::new();
        for _ in 0..400 {
            assert_eq!(h.mgr.recv(accepted.client), ErrorCode::NoError);
            let mut chunk = [0u8; 16];
            match upstream.read(&mut chunk) {
                Ok(n) => got.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => panic!("backend read failed: {e}"),
            }
            if got.len() >= 4 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got, b"ping");
        upstream.set_nonblocking(false).unwrap();

        // A unix-socket write is readable on the other end as soon as it returns.
        upstream.write_all(b"pong").unwrap();
        assert_eq!(h.mgr.recv(accepted.backend), ErrorCode::NoError);
        assert_eq!(h.mgr.pending_bytes(accepted.client), 0);
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn filter_blocks_only_backend_leg() {
        let mut h = harness(blocking_filter(), BridgeLimits::default());
        let (mut client, accepted, mut upstream) = pair(&mut h);

        // Backend → client is never checked.
        upstream.write_all(b"reply").unwrap();
        assert_eq!(h.mgr.recv(accepted.backend), ErrorCode::NoError);
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"reply");

        // Client → backend is refused and stays queued.
        client.write_all(b"insert").unwrap();
        recv_until(&mut h, accepted.client, |mgr, _| mgr.pending_bytes(accepted.backend) == 6);
        assert_eq!(h.mgr.send(accepted.backend), ErrorCode::FilterBlock);
        assert_eq!(h.mgr.send(accepted.client), ErrorCode::NoError);

        assert!(h.mgr.close_both(accepted.backend));
        assert_eq!(h.mgr.bridge_state(accepted.client), BridgeState::Closed);
        assert_eq!(h.mgr.bridge_count(), 0);
    }

    #[test]
    fn full_socket_is_partial_not_fatal() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (_client, accepted, mut upstream) = pair(&mut h);

        const TOTAL: usize = 8 * 1024 * 1024;
        h.mgr
            .conns
            .get_mut(&accepted.backend)
            .unwrap()
            .outbound
            .extend_from_slice(&vec![7u8; TOTAL]);

        assert_eq!(h.mgr.send(accepted.backend), ErrorCode::PartialSkb);
        assert_eq!(h.mgr.bridge_state(accepted.backend), BridgeState::Established);
        assert!(h.mgr.pending_bytes(accepted.backend) > 0);

        let reader = thread::spawn(move || {
            let mut total = 0;
            let mut buf = vec![0u8; 64 * 1024];
            while total < TOTAL {
                let n = upstream.read(&mut buf).unwrap();
                assert!(n > 0);
                total += n;
            }
            total
        });

        let mut attempts = 0;
        loop {
            attempts += 1;
            match h.mgr.send(accepted.backend) {
                ErrorCode::NoError => break,
                ErrorCode::PartialSkb => thread::sleep(Duration::from_millis(1)),
                other => panic!("unexpected {other}"),
            }
            assert!(attempts < 100_000);
        }
        assert_eq!(h.mgr.pending_bytes(accepted.backend), 0);
        assert_eq!(reader.join().unwrap(), TOTAL);
    }

    #[test]
    fn eof_flushes_queued_bytes_before_close() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (mut client, accepted, upstream) = pair(&mut h);

        h.mgr
            .conns
            .get_mut(&accepted.client)
            .unwrap()
            .outbound
            .extend_from_slice(&[9u8; 1024]);
        drop(upstream);

        let code = recv_until(&mut h, accepted.backend, |_, code| code != ErrorCode::NoError);
        assert_eq!(code, ErrorCode::SessionEof);

        assert_eq!(h.mgr.flush(accepted.backend), ErrorCode::NoError);
        assert_eq!(h.mgr.bridge_state(accepted.client), BridgeState::Closing);
        assert!(h.mgr.close_both(accepted.backend));
        assert!(!h.mgr.contains(accepted.client));
        assert!(!h.mgr.contains(accepted.backend));

        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, vec![9u8; 1024]);
    }

    #[test]
    fn flush_waits_for_slow_reader() {
        const PAYLOAD: usize = 4 * 1024 * 1024;
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (mut client, accepted, _upstream) = pair(&mut h);

        h.mgr
            .conns
            .get_mut(&accepted.client)
            .unwrap()
            .outbound
            .extend_from_slice(&vec![3u8; PAYLOAD]);

        let reader = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            let mut received = Vec::new();
            client.read_to_end(&mut received).unwrap();
            received.len()
        });

        assert_eq!(h.mgr.flush(accepted.backend), ErrorCode::NoError);
        assert_eq!(h.mgr.pending_bytes(accepted.client), 0);
        assert!(h.mgr.close_both(accepted.backend));
        assert_eq!(reader.join().unwrap(), PAYLOAD);
    }

    #[test]
    fn flush_gives_up_after_timeout() {
        let limits = BridgeLimits {
            flush_timeout: Duration::from_millis(100),
            ..BridgeLimits::default()
        };
        let mut h = harness(FilterConfig::default(), limits);
        let (_client, accepted, _upstream) = pair(&mut h);

        h.mgr
            .conns
            .get_mut(&accepted.client)
            .unwrap()
            .outbound
            .extend_from_slice(&vec![3u8; 16 * 1024 * 1024]);

        let started = std::time::Instant::now();
        assert_eq!(h.mgr.flush(accepted.backend), ErrorCode::PartialSkb);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(h.mgr.pending_bytes(accepted.client) > 0);
        assert!(h.mgr.close_both(accepted.client));
    }

    #[test]
    fn flush_reports_quota_block() {
        let mut h = harness(blocking_filter(), BridgeLimits::default());
        let (mut client, accepted, mut upstream) = pair(&mut h);

        client.write_all(b"insert").unwrap();
        recv_until(&mut h, accepted.client, |mgr, _| mgr.pending_bytes(accepted.backend) == 6);

        assert_eq!(h.mgr.flush(accepted.client), ErrorCode::FilterBlock);
        assert_eq!(h.mgr.pending_bytes(accepted.backend), 6);
        assert!(h.mgr.close_both(accepted.client));

        upstream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut received = Vec::new();
        upstream.read_to_end(&mut received).unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn close_both_is_idempotent() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (_client, accepted, _upstream) = pair(&mut h);

        assert!(h.mgr.close_both(accepted.client));
        assert!(!h.mgr.close_both(accepted.client));
        assert!(!h.mgr.close_both(accepted.backend));
        assert_eq!(h.mgr.recv(accepted.client), ErrorCode::NoError);
        assert_eq!(h.mgr.send(accepted.backend), ErrorCode::NoError);
        assert_eq!(h.mgr.conn_info(accepted.client), None);
        assert_eq!(h.mgr.other_side_conn_info(accepted.backend), None);
    }

    #[test]
    fn pending_bound_pauses_reading() {
        let limits = BridgeLimits {
            read_chunk_size: 1024,
            max_pending_bytes: 4096,
            ..BridgeLimits::default()
        };
        let mut h = harness(blocking_filter(), limits);
        let (mut client, accepted, _upstream) = pair(&mut h);

        // The filter refuses every backend write, so bytes pile up.
        client.write_all(&[1u8; 16 * 1024]).unwrap();
        recv_until(&mut h, accepted.client, |mgr, _| mgr.is_read_paused(accepted.client));
        let queued = h.mgr.pending_bytes(accepted.backend);
        assert!(queued >= 4096 && queued < 4096 + 1024, "queued {queued}");

        // Paused reads do nothing.
        assert_eq!(h.mgr.recv(accepted.client), ErrorCode::NoError);
        assert_eq!(h.mgr.pending_bytes(accepted.backend), queued);

        // Lifting the quota lets the queue drain and reading resume.
        h.mgr.filter = Arc::new(QuotaFilter::new(&FilterConfig::default()));
        assert_eq!(h.mgr.send(accepted.backend), ErrorCode::NoError);
        assert!(!h.mgr.is_read_paused(accepted.client));
    }

    #[test]
    fn destroy_closes_everything() {
        let mut h = harness(FilterConfig::default(), BridgeLimits::default());
        let (_c1, a1, _u1) = pair(&mut h);
        let (_c2, a2, _u2) = pair(&mut h);

        assert_eq!(h.mgr.destroy(), 2);
        assert_eq!(h.mgr.bridge_count(), 0);
        assert!(h.mgr.local_addr().is_none());
        assert_eq!(h.mgr.bridge_state(a1.client), BridgeState::Closed);
        assert_eq!(h.mgr.bridge_state(a2.backend), BridgeState::Closed);
        assert_eq!(h.mgr.destroy(), 0);
    }
}
