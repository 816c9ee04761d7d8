//! OS signal handling.
//!
//! # Responsibilities
//! - Register the SIGTERM handler
//! - Translate it into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM is the only signal the proxy reacts to

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::observability::ProxyLog;

/// Install the SIGTERM handler and spawn a task that triggers `shutdown` on receipt.
///
/// The task also exits quietly if shutdown is triggered for another reason.
pub fn spawn_termination_listener(
    shutdown: Shutdown,
    log: Arc<dyn ProxyLog>,
) -> Result<JoinHandle<()>, ProxyError> {
    let mut terminate = signal(SignalKind::terminate()).map_err(ProxyError::Signal)?;
    let mut stop = shutdown.subscribe();

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => {
                log.info("Termination signal received.");
                shutdown.trigger();
            }
            _ = stop.recv() => {}
        }
    }))
}
