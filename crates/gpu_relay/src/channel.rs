//! # Channel State
//!
//! The state shared by submitting threads and the GPU worker.
//!
//! ## Two Locks, Two Conditions
//!
//! ```text
//!             ┌──────────── signal lock ────────────┐
//!  submit ──► │ pending: Vec<Command>   (+ running) │ ──► signal_condition ──► worker
//!             └──────────────────┬──────────────────┘
//!                                │ lock order: signal → idle
//!             ┌──────────── idle lock ──────────────┐
//!  worker ──► │ outstanding: queued + in-flight     │ ──► idle_condition ──► waiters
//!             └─────────────────────────────────────┘
//! ```
//!
//! `outstanding` counts every command appended and not yet retired by the
//! worker, so "idle" is `outstanding == 0`, evaluated under the idle lock on
//! every query and never cached. Appending bumps it inside the signal lock,
//! which makes idle go false the instant a command is queued. The worker
//! retires a batch only after executing all of it, which is the only place
//! idle goes true.
//!
//! The in-flight buffer itself is not here: the worker owns it and receives
//! the pending commands by swapping vectors under the signal lock.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::command::Command;

/// Shared hand-off state between submitters and the worker.
pub(crate) struct ChannelState {
    /// Pending buffer; its mutex is the signal lock.
    pending: Mutex<Vec<Command>>,
    /// "Work available" condition.
    signal_condition: Condvar,
    /// Commands queued or in flight; its mutex is the idle lock.
    outstanding: Mutex<usize>,
    /// "Work drained" condition.
    idle_condition: Condvar,
    /// Cleared once, under the signal lock, when shutdown begins.
    running: AtomicBool,
}

impl ChannelState {
    /// Creates a running channel with pre-allocated pending storage.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Vec::with_capacity(capacity)),
            signal_condition: Condvar::new(),
            outstanding: Mutex::new(0),
            idle_condition: Condvar::new(),
            running: AtomicBool::new(true),
        }
    }

    /// Acquires the signal lock.
    pub(crate) fn lock_signal(&self) -> PendingGuard<'_> {
        PendingGuard {
            state: self,
            pending: self.pending.lock(),
        }
    }

    /// Returns true if nothing is queued or in flight.
    pub(crate) fn is_idle(&self) -> bool {
        *self.outstanding.lock() == 0
    }

    /// Returns true until shutdown begins.
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wakes the worker.
    pub(crate) fn signal_work(&self) {
        self.signal_condition.notify_one();
    }

    /// Marks `count` claimed commands as executed.
    ///
    /// Signals idle if that leaves nothing outstanding. Returns whether the
    /// channel is now idle.
    pub(crate) fn retire(&self, count: usize) -> bool {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(count);
        let idle = *outstanding == 0;
        if idle {
            self.signal_idle();
        }
        idle
    }

    /// Wakes every caller blocked in [`Self::wait_for_idle`].
    ///
    /// Several submitters may block on idle at once; all of them are
    /// satisfied by the same drain, so all of them are woken.
    pub(crate) fn signal_idle(&self) {
        self.idle_condition.notify_all();
    }

    /// Forgets every outstanding command and wakes all idle waiters.
    ///
    /// Only for a worker that is exiting: whatever it claimed or left
    /// queued will never run. Returns how many commands were forgotten.
    pub(crate) fn retire_all(&self) -> usize {
        let mut outstanding = self.outstanding.lock();
        let abandoned = std::mem::take(&mut *outstanding);
        self.signal_idle();
        abandoned
    }

    /// Blocks until nothing is outstanding.
    ///
    /// Stopping alone does not release waiters: a draining worker still runs
    /// their commands, and every worker exit ends in [`Self::retire_all`].
    pub(crate) fn wait_for_idle(&self) {
        let mut outstanding = self.outstanding.lock();
        while *outstanding != 0 {
            self.idle_condition.wait(&mut outstanding);
        }
    }
}

/// The signal lock, held.
///
/// Every operation on the pending buffer goes through this guard, so none of
/// them can run without the lock.
pub(crate) struct PendingGuard<'a> {
    state: &'a ChannelState,
    pending: MutexGuard<'a, Vec<Command>>,
}

impl PendingGuard<'_> {
    /// Appends a command; idle becomes false before the lock is released.
    ///
    /// Does not wake the worker.
    pub(crate) fn append(&mut self, command: Command) {
        let mut outstanding = self.state.outstanding.lock();
        self.pending.push(command);
        *outstanding += 1;
    }

    /// Moves every pending command into the worker's in-flight buffer.
    ///
    /// The two vectors are swapped, so the commands keep their order and
    /// the pending buffer inherits the in-flight buffer's capacity.
    /// Returns the number of commands claimed.
    pub(crate) fn drain_into_inflight(&mut self, in_flight: &mut Vec<Command>) -> usize {
        debug_assert!(in_flight.is_empty(), "in-flight buffer claimed twice");
        std::mem::swap(&mut *self.pending, in_flight);
        in_flight.len()
    }

    /// Full idle check: pending empty and nothing in flight.
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.state.is_idle()
    }

    /// Returns true until shutdown begins.
    pub(crate) fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Number of commands waiting to be claimed.
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Clears the running flag. Returns true only for the call that cleared it.
    pub(crate) fn stop(&mut self) -> bool {
        self.state.running.swap(false, Ordering::AcqRel)
    }

    /// Drops every pending command. Returns how many were dropped.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            self.pending.clear();
            self.state.retire(dropped);
        }
        dropped
    }

    /// Blocks the worker until there is pending work or shutdown begins.
    pub(crate) fn wait_for_work(&mut self) {
        while self.pending.is_empty() && self.state.is_running() {
            self.state.signal_condition.wait(&mut self.pending);
        }
    }
}
