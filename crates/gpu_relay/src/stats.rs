//! Dispatch statistics.
//!
//! Counters are bumped with relaxed atomics from both sides of the boundary;
//! take a [`StatsSnapshot`] to read them together.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::command::CommandKind;

/// Live counters shared by dispatcher and worker.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Commands executed on the submitting thread.
    pub inline_executions: AtomicU64,
    /// Commands appended to the pending buffer.
    pub deferred_submissions: AtomicU64,
    /// Commands executed by the worker.
    pub worker_executions: AtomicU64,
    /// Times the worker woke up with work to claim.
    pub worker_wakeups: AtomicU64,
    /// Commands dropped (shutdown, or submitted after it).
    pub discarded: AtomicU64,
    /// Times a caller blocked waiting for idle.
    pub idle_waits: AtomicU64,
    /// Largest batch claimed in one drain cycle.
    pub max_batch: AtomicU64,
    per_kind: [AtomicU64; CommandKind::COUNT],
}

impl DispatchStats {
    pub(crate) fn record_inline(&self, kind: CommandKind) {
        self.inline_executions.fetch_add(1, Ordering::Relaxed);
        self.per_kind[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self) {
        self.deferred_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_worker_execution(&self, kind: CommandKind) {
        self.worker_executions.fetch_add(1, Ordering::Relaxed);
        self.per_kind[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wakeup(&self, batch: usize) {
        self.worker_wakeups.fetch_add(1, Ordering::Relaxed);
        self.max_batch.fetch_max(batch as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_wait(&self) {
        self.idle_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Executions of one command kind, on either path.
    #[must_use]
    pub fn executed(&self, kind: CommandKind) -> u64 {
        self.per_kind[kind as usize].load(Ordering::Relaxed)
    }

    /// Copies every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inline_executions: self.inline_executions.load(Ordering::Relaxed),
            deferred_submissions: self.deferred_submissions.load(Ordering::Relaxed),
            worker_executions: self.worker_executions.load(Ordering::Relaxed),
            worker_wakeups: self.worker_wakeups.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle_waits: self.idle_waits.load(Ordering::Relaxed),
            max_batch: self.max_batch.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Commands executed on the submitting thread.
    pub inline_executions: u64,
    /// Commands appended to the pending buffer.
    pub deferred_submissions: u64,
    /// Commands executed by the worker.
    pub worker_executions: u64,
    /// Times the worker woke up with work to claim.
    pub worker_wakeups: u64,
    /// Commands dropped unexecuted.
    pub discarded: u64,
    /// Times a caller blocked waiting for idle.
    pub idle_waits: u64,
    /// Largest batch claimed in one drain cycle.
    pub max_batch: u64,
}

impl StatsSnapshot {
    /// Commands executed on either path.
    #[must_use]
    pub fn total_executed(&self) -> u64 {
        self.inline_executions + self.worker_executions
    }
}
