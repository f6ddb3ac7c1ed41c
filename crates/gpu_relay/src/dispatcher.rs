//! # Dispatcher
//!
//! Entry point for every thread that produces GPU work. Each call decides
//! between two paths:
//!
//! ```text
//!                    ┌─ re-entrant? ────────────────────────► execute here
//!  submit(cmd) ──────┤
//!                    └─ signal lock ─┬─ stopped? ───────────► drop
//!                                    ├─ inline && idle? ────► execute here (lock held)
//!                                    └─ append ─► wake worker ─► [wait for idle]
//! ```
//!
//! "Re-entrant" means the caller is the worker thread, or a thread that is
//! already executing an inline command for this engine. Queueing from there
//! would wait on work that only this thread can finish.
//!
//! The inline decision and the inline execution both happen under the signal
//! lock. While it is held nothing can be appended and the worker cannot
//! claim a batch, so the backend is never driven from two threads at once.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use gpu_relay_shared::{CommandList, FramebufferConfig, GuestAddr, Region};

use crate::backend::Backend;
use crate::channel::ChannelState;
use crate::command::Command;
use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::stats::{DispatchStats, StatsSnapshot};
use crate::worker::WorkerPhase;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Engine whose command this thread is executing inline, 0 if none.
    static EXECUTING_ENGINE: Cell<u64> = const { Cell::new(0) };
}

/// Marks the current thread as executing for an engine until dropped.
struct ExecutionScope {
    previous: u64,
}

impl ExecutionScope {
    fn enter(engine_id: u64) -> Self {
        Self {
            previous: EXECUTING_ENGINE.with(|cell| cell.replace(engine_id)),
        }
    }

    fn is_active(engine_id: u64) -> bool {
        EXECUTING_ENGINE.with(Cell::get) == engine_id
    }
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        EXECUTING_ENGINE.with(|cell| cell.set(self.previous));
    }
}

/// How a submitted command was handled.
///
/// This is an outcome, not an error: submission itself cannot fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Executed synchronously on the calling thread.
    Inline,
    /// Queued for the worker.
    Deferred,
    /// Dropped because the engine has shut down.
    Discarded,
}

/// State reachable from every dispatcher handle and from the worker.
pub(crate) struct Shared<B: Backend> {
    pub(crate) id: u64,
    pub(crate) channel: ChannelState,
    pub(crate) backend: Arc<B>,
    pub(crate) stats: DispatchStats,
    pub(crate) pending_capacity: usize,
    strict_coherency: AtomicBool,
    worker_thread: OnceLock<ThreadId>,
    phase: AtomicU8,
}

impl<B: Backend> Shared<B> {
    pub(crate) fn new(backend: Arc<B>, config: &RelayConfig) -> Self {
        Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            channel: ChannelState::new(config.pending_capacity),
            backend,
            stats: DispatchStats::default(),
            pending_capacity: config.pending_capacity,
            strict_coherency: AtomicBool::new(config.strict_coherency),
            worker_thread: OnceLock::new(),
            phase: AtomicU8::new(WorkerPhase::Running as u8),
        }
    }

    /// Records the worker's identity. Only the first call has any effect.
    pub(crate) fn record_worker_thread(&self, id: ThreadId) {
        let _ = self.worker_thread.set(id);
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        self.worker_thread.get() == Some(&thread::current().id())
    }

    pub(crate) fn set_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }
}

/// Cloneable handle for submitting work to a GPU thread.
///
/// A backend that needs to submit from inside its own command handlers can
/// keep one of these. It then shares ownership of itself, so the engine's
/// memory lives until the handler drops the handle; the worker thread is
/// still stopped and joined when the owning [`crate::GpuThread`] goes away.
pub struct Dispatcher<B: Backend> {
    pub(crate) shared: Arc<Shared<B>>,
}

impl<B: Backend> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Backend> Dispatcher<B> {
    /// Hands a command to the engine.
    ///
    /// * `wait_for_idle` - after queueing, block until the engine is idle
    /// * `allow_inline` - execute on this thread if nothing is outstanding
    ///
    /// Re-entrant calls always execute inline and never wait.
    pub fn submit(&self, command: Command, wait_for_idle: bool, allow_inline: bool) -> Dispatch {
        if self.must_run_here() {
            self.execute_inline(command);
            return Dispatch::Inline;
        }

        let mut pending = self.shared.channel.lock_signal();

        if !pending.is_running() {
            drop(pending);
            tracing::debug!("GPU relay stopped, dropping {}", command.kind());
            self.shared.stats.record_discarded(1);
            return Dispatch::Discarded;
        }

        if allow_inline && pending.is_idle() {
            self.execute_inline(command);
            drop(pending);
            return Dispatch::Inline;
        }

        pending.append(command);
        drop(pending);

        self.shared.channel.signal_work();
        self.shared.stats.record_deferred();

        if wait_for_idle {
            self.shared.stats.record_idle_wait();
            self.shared.channel.wait_for_idle();
        }

        Dispatch::Deferred
    }

    /// Queues a command list. Fire-and-forget; empty lists are ignored.
    pub fn submit_list(&self, list: CommandList) {
        if list.is_empty() {
            return;
        }
        self.submit(Command::SubmitList(list), false, false);
    }

    /// Decodes raw little-endian GPFIFO entries and queues them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RelayError::CommandList`] if `bytes` does not hold a
    /// whole number of entries. Nothing is submitted in that case.
    pub fn submit_list_bytes(&self, bytes: &[u8]) -> RelayResult<()> {
        let list = CommandList::from_le_bytes(bytes)?;
        self.submit_list(list);
        Ok(())
    }

    /// Presents a frame once every earlier command has executed.
    pub fn swap_buffers(&self, framebuffer: Option<FramebufferConfig>) {
        self.submit(Command::SwapBuffers(framebuffer), true, false);
    }

    /// Makes GPU writes to the region visible to the guest.
    ///
    /// In relaxed mode the flush itself is skipped and this only waits for
    /// the engine to go idle.
    pub fn flush_region(&self, addr: GuestAddr, size: u64) {
        if self.is_strict_coherency() {
            self.submit(Command::FlushRegion(Region { addr, size }), true, false);
        } else {
            self.wait_for_idle();
        }
    }

    /// Discards GPU caches covering the region.
    pub fn invalidate_region(&self, addr: GuestAddr, size: u64) {
        self.submit(Command::InvalidateRegion(Region { addr, size }), true, true);
    }

    /// Flushes and invalidates the region; relaxed mode only invalidates.
    pub fn flush_and_invalidate_region(&self, addr: GuestAddr, size: u64) {
        if self.is_strict_coherency() {
            self.submit(
                Command::FlushAndInvalidateRegion(Region { addr, size }),
                true,
                false,
            );
        } else {
            self.invalidate_region(addr, size);
        }
    }

    /// Blocks until every command submitted so far has executed.
    pub fn wait_for_idle(&self) {
        self.submit(Command::WaitForIdle, true, true);
    }

    /// Returns the current coherency mode.
    #[must_use]
    pub fn is_strict_coherency(&self) -> bool {
        self.shared.strict_coherency.load(Ordering::Relaxed)
    }

    /// Switches coherency mode; takes effect on the next flush call.
    pub fn set_strict_coherency(&self, strict: bool) {
        self.shared.strict_coherency.store(strict, Ordering::Relaxed);
    }

    /// Returns true if nothing is queued or executing on the worker.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.channel.is_idle()
    }

    /// Returns true until shutdown begins.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.channel.is_running()
    }

    /// Returns true if called from the worker thread.
    #[must_use]
    pub fn is_worker_thread(&self) -> bool {
        self.shared.is_worker_thread()
    }

    /// Current phase of the worker.
    #[must_use]
    pub fn worker_phase(&self) -> WorkerPhase {
        self.shared.phase()
    }

    /// Live counters.
    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.shared.stats
    }

    /// Copy of the counters.
    #[must_use]
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// The backend commands are executed against.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.shared.backend
    }

    fn must_run_here(&self) -> bool {
        self.shared.is_worker_thread() || ExecutionScope::is_active(self.shared.id)
    }

    fn execute_inline(&self, command: Command) {
        let kind = command.kind();
        let _scope = ExecutionScope::enter(self.shared.id);
        command.execute(&*self.shared.backend);
        self.shared.stats.record_inline(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        regions: Mutex<Vec<(GuestAddr, u64)>>,
    }

    impl Backend for Recorder {
        fn push_command_list(&self, _list: CommandList) {}
        fn dispatch_calls(&self) {}
        fn swap_buffers(&self, _framebuffer: Option<FramebufferConfig>) {}
        fn flush_region(&self, addr: GuestAddr, size: u64) {
            self.regions.lock().push((addr, size));
        }
        fn invalidate_region(&self, addr: GuestAddr, size: u64) {
            self.regions.lock().push((addr, size));
        }
        fn flush_and_invalidate_region(&self, addr: GuestAddr, size: u64) {
            self.regions.lock().push((addr, size));
        }
    }

    /// A dispatcher with no worker: deferred commands just sit in pending.
    fn detached() -> Dispatcher<Recorder> {
        Dispatcher {
            shared: Arc::new(Shared::new(Arc::new(Recorder::default()), &RelayConfig::default())),
        }
    }

    #[test]
    fn test_inline_when_idle() {
        let dispatcher = detached();
        let outcome = dispatcher.submit(Command::invalidate(0x1000, 0x10), true, true);
        assert_eq!(outcome, Dispatch::Inline);
        assert_eq!(dispatcher.backend().regions.lock().len(), 1);
        assert!(dispatcher.is_idle());
        assert_eq!(dispatcher.stats_snapshot().deferred_submissions, 0);
    }

    #[test]
    fn test_deferred_without_inline_permission() {
        let dispatcher = detached();
        let outcome = dispatcher.submit(Command::flush(0x1000, 0x10), false, false);
        assert_eq!(outcome, Dispatch::Deferred);
        assert!(!dispatcher.is_idle());
        assert!(dispatcher.backend().regions.lock().is_empty());
    }

    #[test]
    fn test_backlog_forces_deferral() {
        let dispatcher = detached();
        dispatcher.submit(Command::flush(0x1000, 0x10), false, false);

        // Not idle, so even an inline-capable command must queue behind it.
        let outcome = dispatcher.submit(Command::invalidate(0x2000, 0x10), false, true);
        assert_eq!(outcome, Dispatch::Deferred);
        assert_eq!(dispatcher.shared.channel.lock_signal().len(), 2);
    }

    #[test]
    fn test_stopped_engine_discards() {
        let dispatcher = detached();
        dispatcher.shared.channel.lock_signal().stop();

        assert_eq!(dispatcher.submit(Command::WaitForIdle, true, true), Dispatch::Discarded);
        assert_eq!(
            dispatcher.submit(Command::flush(0, 1), true, false),
            Dispatch::Discarded
        );
        // Returns immediately rather than blocking on a dead worker.
        dispatcher.wait_for_idle();
        assert_eq!(dispatcher.stats_snapshot().discarded, 3);
        assert!(dispatcher.backend().regions.lock().is_empty());
    }

    #[test]
    fn test_empty_list_not_submitted() {
        let dispatcher = detached();
        dispatcher.submit_list(CommandList::new());
        assert!(dispatcher.is_idle());
        assert_eq!(dispatcher.stats_snapshot().deferred_submissions, 0);
    }

    #[test]
    fn test_malformed_list_bytes_rejected() {
        let dispatcher = detached();
        assert!(dispatcher.submit_list_bytes(&[0u8; 7]).is_err());
        assert!(dispatcher.is_idle());

        dispatcher.submit_list_bytes(&[0u8; 16]).unwrap();
        assert!(!dispatcher.is_idle());
    }

    #[test]
    fn test_relaxed_flush_and_invalidate_only_invalidates() {
        let dispatcher = detached();
        assert!(!dispatcher.is_strict_coherency());

        dispatcher.flush_and_invalidate_region(GuestAddr::new(0x4000), 0x100);
        assert_eq!(dispatcher.stats().executed(crate::CommandKind::InvalidateRegion), 1);
        assert_eq!(
            dispatcher.stats().executed(crate::CommandKind::FlushAndInvalidateRegion),
            0
        );
    }

    #[test]
    fn test_relaxed_flush_is_idle_wait() {
        let dispatcher = detached();
        dispatcher.flush_region(GuestAddr::new(0x4000), 0x100);
        assert_eq!(dispatcher.stats().executed(crate::CommandKind::WaitForIdle), 1);
        assert!(dispatcher.backend().regions.lock().is_empty());
    }

    #[test]
    fn test_coherency_toggle() {
        let dispatcher = detached();
        dispatcher.set_strict_coherency(true);
        assert!(dispatcher.is_strict_coherency());
        dispatcher.set_strict_coherency(false);
        assert!(!dispatcher.is_strict_coherency());
    }

    #[test]
    fn test_execution_scope_nests() {
        assert!(!ExecutionScope::is_active(7));
        {
            let _outer = ExecutionScope::enter(7);
            assert!(ExecutionScope::is_active(7));
            {
                let _inner = ExecutionScope::enter(8);
                assert!(ExecutionScope::is_active(8));
                assert!(!ExecutionScope::is_active(7));
            }
            assert!(ExecutionScope::is_active(7));
        }
        assert!(!ExecutionScope::is_active(7));
    }
}
