//! Quota state and the synchronous admission check.
//!
//! # Design Decisions
//! - Counters are atomics: the refreshers store, the reactor loads, nobody waits
//! - `check` never touches the filesystem; staleness is bounded by the refresh interval
//! - File quota blocks once usage exceeds the limit, data quota once usage reaches it

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::FilterConfig;

/// Admission decision for backend-bound bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
}

/// Usage counters shared between the refreshers and the reactor.
#[derive(Debug, Default)]
pub struct QuotaState {
    file_count: AtomicU64,
    data_size: AtomicU64,
}

impl QuotaState {
    pub fn file_count(&self) -> u64 {
        self.file_count.load(Ordering::Relaxed)
    }

    pub fn data_size(&self) -> u64 {
        self.data_size.load(Ordering::Relaxed)
    }

    pub(crate) fn store_file_count(&self, files: u64) {
        self.file_count.store(files, Ordering::Relaxed);
    }

    pub(crate) fn store_data_size(&self, bytes: u64) {
        self.data_size.store(bytes, Ordering::Relaxed);
    }
}

/// Quota filter consulted before any byte is written to the backend.
#[derive(Debug)]
pub struct QuotaFilter {
    enabled: bool,
    base_dir: PathBuf,
    quota_files: u64,
    quota_data_size: u64,
    file_count_interval: Duration,
    data_size_interval: Duration,
    state: QuotaState,
}

impl QuotaFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            enabled: config.enabled,
            base_dir: PathBuf::from(config.base_dir.trim()),
            quota_files: config.quota_files,
            quota_data_size: config.quota_data_size_bytes(),
            file_count_interval: Duration::from_secs(config.file_count_interval_secs.max(1)),
            data_size_interval: Duration::from_secs(config.data_size_interval_secs.max(1)),
            state: QuotaState::default(),
        }
    }

    /// Whether quota enforcement is on.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether `byte_count` bytes may be forwarded to the backend.
    pub fn check(&self, byte_count: usize) -> Verdict {
        if !self.enabled || byte_count == 0 {
            return Verdict::Allow;
        }

        if self.state.file_count() > self.quota_files
            || self.state.data_size() >= self.quota_data_size
        {
            Verdict::Block
        } else {
            Verdict::Allow
        }
    }

    pub fn state(&self) -> &QuotaState {
        &self.state
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn quota_files(&self) -> u64 {
        self.quota_files
    }

    /// Data size limit in bytes.
    pub fn quota_data_size(&self) -> u64 {
        self.quota_data_size
    }

    pub fn file_count_interval(&self) -> Duration {
        self.file_count_interval
    }

    pub fn data_size_interval(&self) -> Duration {
        self.data_size_interval
    }
}
