//! Process-wide dispatch counters and the recent-outcome log.

use crate::models::{DispatchOutcome, DispatchReport};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free counters shared by every dispatch job
///
/// Each counter only moves through `fetch_add`/`fetch_sub`, so concurrent
/// completions never lose updates.
#[derive(Debug)]
pub struct DispatchStats {
    queued: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    in_flight: AtomicU64,
    rejected: AtomicU64,
    unrecognized: AtomicU64,
    unavailable: AtomicU64,
    accepting: AtomicBool,
    recent: Mutex<VecDeque<DispatchReport>>,
    recent_capacity: usize,
}

/// Snapshot returned by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatus {
    /// Jobs accepted since start
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    /// Jobs dropped by shutdown while waiting to retry
    pub abandoned: u64,
    pub in_flight: u64,
    /// Submissions refused (queue full or shut down)
    pub rejected: u64,
    /// Receivers that were neither email nor phone
    pub unrecognized: u64,
    /// Receivers whose channel is not configured
    pub unavailable: u64,
    pub accepting: bool,
}

impl DispatchStats {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            queued: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            unrecognized: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
            recent: Mutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity,
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the number of jobs still in flight
    pub(crate) fn record_job_exit(&self) -> u64 {
        self.in_flight.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unrecognized(&self) {
        self.unrecognized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a terminal outcome and keep its report
    pub(crate) fn record_outcome(&self, report: DispatchReport) {
        match report.outcome {
            DispatchOutcome::Sent => self.sent.fetch_add(1, Ordering::Relaxed),
            DispatchOutcome::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            DispatchOutcome::Abandoned => self.abandoned.fetch_add(1, Ordering::Relaxed),
            DispatchOutcome::Pending => return,
        };

        if self.recent_capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock();
        if recent.len() == self.recent_capacity {
            recent.pop_front();
        }
        recent.push_back(report);
    }

    pub(crate) fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> DispatchStatus {
        DispatchStatus {
            queued: self.queued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            accepting: self.is_accepting(),
        }
    }

    /// Most recent terminal outcomes, newest last
    pub fn recent(&self) -> Vec<DispatchReport> {
        self.recent.lock().iter().cloned().collect()
    }
}
