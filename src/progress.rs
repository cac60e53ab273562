//! Shared transfer state between the worker and its observers.
//!
//! The worker is the only writer.  It publishes `current` with `Release`
//! after each block has been fully written; observers load it with
//! `Acquire` and never take a lock, so polling cannot stall the worker.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Default observer cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// A point-in-time view of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: u64,
    pub total:   u64,
}

impl Progress {
    /// Completed share in `[0.0, 1.0]`.  An empty input counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.current as f64 / self.total as f64
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.current == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>12} / {:>12} [{:>5.1}%]", self.current, self.total, self.percent())
    }
}

// ── TransferState ────────────────────────────────────────────────────────────

/// Byte accounting for one run.  `total` is fixed when the run starts.
#[derive(Debug)]
pub struct TransferState {
    total:   u64,
    current: AtomicU64,
}

impl TransferState {
    pub fn new(total: u64) -> Self {
        Self { total, current: AtomicU64::new(0) }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Record `n` more bytes as written.  Returns the new offset.
    pub(crate) fn advance(&self, n: u64) -> u64 {
        self.current.fetch_add(n, Ordering::Release) + n
    }

    /// Latest committed snapshot, clamped so that `current <= total` even if
    /// the input grew after its size was taken.
    pub fn snapshot(&self) -> Progress {
        let current = self.current.load(Ordering::Acquire);
        Progress { current: current.min(self.total), total: self.total }
    }
}

/// Cloneable read-only view of a [`TransferState`], safe to hand to another
/// thread.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    state: Arc<TransferState>,
}

impl ProgressHandle {
    pub(crate) fn new(state: Arc<TransferState>) -> Self {
        Self { state }
    }

    pub fn poll(&self) -> Progress {
        self.state.snapshot()
    }

    pub fn total(&self) -> u64 {
        self.state.total()
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Cooperative cancellation flag, checked by the worker between blocks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
