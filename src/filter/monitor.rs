//! Background quota refreshers.
//!
//! # Responsibilities
//! - Periodically count data files under the base directory
//! - Periodically sum their sizes
//! - Publish both into `QuotaState`
//!
//! Scans run on the blocking pool; each refresher has its own interval and
//! exits on the shutdown broadcast.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use walkdir::WalkDir;

use crate::filter::quota::QuotaFilter;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::observability::ProxyLog;

/// Number of regular files below `dir`.
pub fn count_files(dir: &Path) -> io::Result<u64> {
    let mut files = 0;
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            // Files come and go while the database runs; only a bad root is fatal.
            Err(e) if e.depth() > 0 => continue,
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() {
            files += 1;
        }
    }
    Ok(files)
}

/// Total size in bytes of the regular files below `dir`.
pub fn total_size(dir: &Path) -> io::Result<u64> {
    let mut bytes = 0u64;
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 => continue,
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            bytes = bytes.saturating_add(meta.len());
        }
    }
    Ok(bytes)
}

/// Drives the two refreshers for one filter.
#[derive(Clone)]
pub struct QuotaMonitor {
    filter: Arc<QuotaFilter>,
    log: Arc<dyn ProxyLog>,
}

impl QuotaMonitor {
    pub fn new(filter: Arc<QuotaFilter>, log: Arc<dyn ProxyLog>) -> Self {
        Self { filter, log }
    }

    /// Spawn both refreshers. Nothing is spawned when the filter is disabled.
    pub fn spawn(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        if !self.filter.enabled() {
            return Vec::new();
        }

        let files = self.clone();
        let files_shutdown = shutdown.subscribe();
        let size = self.clone();
        let size_shutdown = shutdown.subscribe();

        vec![
            tokio::spawn(async move { files.monitor_file_count(files_shutdown).await }),
            tokio::spawn(async move { size.monitor_data_size(size_shutdown).await }),
        ]
    }

    /// Recount files every `file_count_interval` until shutdown.
    pub async fn monitor_file_count(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.filter.file_count_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_file_count().await;
                }
                _ = shutdown.recv() => {
                    self.log.debug("File count monitor received shutdown signal, exiting loop.");
                    break;
                }
            }
        }
    }

    /// Re-sum data size every `data_size_interval` until shutdown.
    pub async fn monitor_data_size(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.filter.data_size_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_data_size().await;
                }
                _ = shutdown.recv() => {
                    self.log.debug("Data size monitor received shutdown signal, exiting loop.");
                    break;
                }
            }
        }
    }

    /// Scan once and publish the file count. Keeps the previous value on failure.
    pub async fn refresh_file_count(&self) {
        let dir = self.filter.base_dir().to_path_buf();
        match tokio::task::spawn_blocking(move || count_files(&dir)).await {
            Ok(Ok(files)) => {
                self.filter.state().store_file_count(files);
                metrics::record_quota_file_count(files);
            }
            Ok(Err(e)) => self.log.error(&format!(
                "Failed to count files under [{}] [{}].",
                self.filter.base_dir().display(),
                e
            )),
            Err(e) => self.log.error(&format!("File count scan aborted [{}].", e)),
        }
    }

    /// Scan once and publish the data size. Keeps the previous value on failure.
    pub async fn refresh_data_size(&self) {
        let dir = self.filter.base_dir().to_path_buf();
        match tokio::task::spawn_blocking(move || total_size(&dir)).await {
            Ok(Ok(bytes)) => {
                self.filter.state().store_data_size(bytes);
                metrics::record_quota_data_size(bytes);
            }
            Ok(Err(e)) => self.log.error(&format!(
                "Failed to measure data size under [{}] [{}].",
                self.filter.base_dir().display(),
                e
            )),
            Err(e) => self.log.error(&format!("Data size scan aborted [{}].", e)),
        }
    }
}
