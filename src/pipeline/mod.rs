//! Concurrent fetch pipeline
//!
//! Three cooperating pieces move locators to items:
//!
//! ```text
//!                 ┌──────────────┐   job queue    ┌─────────────┐
//!  submit ───────▶│   Dispatch   │──────────────▶│   Workers   │──▶ processor
//!                 │     loop     │◀──────────────│   (pool)    │
//!  report_error ─▶│              │  SourceError   └─────────────┘
//!                 └──────────────┘
//!
//!  fetch_all ────▶ ScatterGather: one task per locator ──▶ fan-in channel
//! ```
//!
//! - [`worker`]: fixed pool of tasks draining a bounded job queue
//! - [`gather`]: per-request fan-out with one outcome per locator
//! - [`dispatch`]: long-lived loop routing submissions and errors

pub mod dispatch;
pub mod gather;
pub mod worker;

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub use dispatch::{DispatchHandle, DispatchState, ErrorHandler};
pub use gather::{GatherResult, ScatterGather};
pub use worker::{Job, SourceProcessor, WorkerPool, WorkerPoolConfig};

// ============================================================================
// Pool Statistics
// ============================================================================

/// Worker pool counters (thread-safe)
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Jobs accepted by `submit`
    pub submitted: AtomicU64,

    /// Jobs whose processor returned items
    pub succeeded: AtomicU64,

    /// Jobs that failed (timeouts included)
    pub failed: AtomicU64,

    /// Jobs that hit the per-job deadline
    pub timed_out: AtomicU64,

    /// Jobs abandoned because the pool was cancelled
    pub cancelled: AtomicU64,

    /// Items returned by successful jobs
    pub items: AtomicU64,
}

impl PoolStats {
    pub fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, items: usize) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.items.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
        self.record_failure();
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub items: u64,
}

impl StatsSnapshot {
    /// Jobs that have finished one way or another
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled
    }
}
