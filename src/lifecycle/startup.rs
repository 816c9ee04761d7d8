//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and resolve both endpoints
//! - Create the quota filter, reactor and bridge manager in order
//! - Bind the listener (traffic only once everything else is ready)
//! - Run the reactor on a dedicated thread next to the async refreshers
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned before the loop is entered
//! - The SIGTERM handler is installed before any background task starts
//! - Shutdown order: reactor exits → refreshers stop → tasks joined → "quit"

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::validation::{backend_endpoint, listen_endpoint, validate_config};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::filter::{QuotaFilter, QuotaMonitor};
use crate::lifecycle::{spawn_termination_listener, Shutdown};
use crate::net::{BridgeLimits, BridgeManager, Endpoint};
use crate::observability::ProxyLog;
use crate::reactor::Reactor;

/// A fully initialized proxy, bound and ready to run.
pub struct ProxyServer {
    reactor: Reactor,
    bridges: BridgeManager,
    filter: Arc<QuotaFilter>,
    log: Arc<dyn ProxyLog>,
    shutdown: Shutdown,
    local_addr: SocketAddr,
    backend: Endpoint,
}

impl ProxyServer {
    /// Build every subsystem from `config` and bind the public listener.
    pub fn bind(config: &ProxyConfig, log: Arc<dyn ProxyLog>) -> Result<Self, ProxyError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let listen = listen_endpoint(config)?;
        let backend = backend_endpoint(config)?;

        let filter = Arc::new(QuotaFilter::new(&config.filter));
        let reactor = Reactor::new(&config.reactor, backend.clone(), log.clone())?;
        let mut bridges = BridgeManager::new(
            reactor.registry()?,
            filter.clone(),
            log.clone(),
            BridgeLimits::from_config(&config.listener, &config.reactor),
        );
        let local_addr = bridges.listen(&listen)?;

        Ok(Self {
            reactor,
            bridges,
            filter,
            log,
            shutdown: Shutdown::new(),
            local_addr,
            backend,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the server from outside (tests, embedding).
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn filter(&self) -> Arc<QuotaFilter> {
        self.filter.clone()
    }

    /// Serve until SIGTERM or `Shutdown::trigger`.
    pub async fn run(self) -> Result<(), ProxyError> {
        let ProxyServer {
            reactor,
            bridges,
            filter,
            log,
            shutdown,
            local_addr,
            backend,
        } = self;

        let signals = spawn_termination_listener(shutdown.clone(), log.clone())?;
        let monitors = QuotaMonitor::new(filter.clone(), log.clone()).spawn(&shutdown);

        log.debug(&format!(
            "Database proxy listening on [{}], backend [{}], quota {}.",
            local_addr,
            backend,
            if filter.enabled() { "enabled" } else { "disabled" }
        ));

        let flag = shutdown.flag();
        let outcome = tokio::task::spawn_blocking(move || reactor.run(bridges, &flag)).await;

        // The reactor may have stopped on its own (readiness failure); release everyone else.
        shutdown.trigger();
        for handle in monitors {
            if let Err(e) = handle.await {
                log.error(&format!("Quota refresher ended abnormally [{}].", e));
            }
        }
        if let Err(e) = signals.await {
            log.error(&format!("Signal listener ended abnormally [{}].", e));
        }

        log.info("Database proxy server quit.");
        outcome?
    }
}
