//! # GPU Worker Loop
//!
//! The single thread that owns rendering.
//!
//! ```text
//!  ┌─────────┐  running cleared  ┌───────────────┐  policy done  ┌─────────┐
//!  │ Running │ ────────────────► │ DrainingFinal │ ────────────► │ Stopped │
//!  └────┬────┘                   └───────────────┘               └─────────┘
//!       │ ▲
//!  wait │ │ retire batch, signal idle
//!       ▼ │
//!   claim pending → execute in-flight (signal lock released)
//! ```
//!
//! The worker holds the signal lock only to wait and to claim; commands run
//! with no relay lock held, so submitters keep appending while the backend
//! works.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;

use crate::backend::{Backend, RenderContext};
use crate::command::Command;
use crate::config::ShutdownPolicy;
use crate::dispatcher::Shared;
use crate::error::RelayResult;

/// Lifecycle phase of the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerPhase {
    /// Waiting for or executing work.
    Running = 0,
    /// Shutdown observed; applying the shutdown policy.
    DrainingFinal = 1,
    /// Exited. Terminal.
    Stopped = 2,
}

impl WorkerPhase {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::DrainingFinal,
            _ => Self::Stopped,
        }
    }
}

/// Leaves the engine stopped with nothing outstanding however the worker
/// exits, including a backend panic unwinding through [`run`].
struct ExitGuard<'a, B: Backend> {
    shared: &'a Shared<B>,
}

impl<B: Backend> Drop for ExitGuard<'_, B> {
    fn drop(&mut self) {
        if thread::panicking() {
            let dropped = {
                let mut pending = self.shared.channel.lock_signal();
                pending.stop();
                pending.discard_pending()
            };
            self.shared.stats.record_discarded(dropped);
            tracing::warn!("GPU worker panicked, {} pending commands dropped", dropped);
        }
        let abandoned = self.shared.channel.retire_all();
        if abandoned > 0 {
            tracing::warn!("GPU worker exited with {} claimed commands unfinished", abandoned);
        }
        self.shared.set_phase(WorkerPhase::Stopped);
    }
}

/// Worker thread body.
///
/// Acquires the rendering context, reports the result through `ready`, then
/// serves commands until shutdown.
pub(crate) fn run<B, C>(
    shared: Arc<Shared<B>>,
    context: C,
    policy: ShutdownPolicy,
    ready: Sender<RelayResult<()>>,
) where
    B: Backend,
    C: RenderContext,
{
    let _exit = ExitGuard { shared: &shared };

    // Held until this function returns, releasing the context on this thread.
    let _context = match context.make_current() {
        Ok(scope) => {
            let _ = ready.send(Ok(()));
            scope
        }
        Err(err) => {
            tracing::warn!("GPU worker could not acquire rendering context: {}", err);
            shared.channel.lock_signal().stop();
            let _ = ready.send(Err(err));
            return;
        }
    };
    drop(ready);

    tracing::info!(
        "GPU worker started: {}",
        thread::current().name().unwrap_or("<unnamed>")
    );

    let mut in_flight: Vec<Command> = Vec::with_capacity(shared.pending_capacity);

    loop {
        let claimed = {
            let mut pending = shared.channel.lock_signal();
            pending.wait_for_work();
            if !pending.is_running() {
                break;
            }
            pending.drain_into_inflight(&mut in_flight)
        };

        shared.stats.record_wakeup(claimed);
        execute_batch(&shared, &mut in_flight);

        if shared.channel.retire(claimed) {
            tracing::trace!("GPU worker idle after batch of {}", claimed);
        }
    }

    shared.set_phase(WorkerPhase::DrainingFinal);
    finish(&shared, policy, &mut in_flight);

    tracing::info!("GPU worker stopped");
}

/// Applies the shutdown policy to whatever is still pending.
fn finish<B: Backend>(shared: &Shared<B>, policy: ShutdownPolicy, in_flight: &mut Vec<Command>) {
    match policy {
        ShutdownPolicy::Discard => {
            let dropped = shared.channel.lock_signal().discard_pending();
            if dropped > 0 {
                shared.stats.record_discarded(dropped);
                tracing::warn!("GPU worker shut down with {} pending commands dropped", dropped);
            }
        }
        ShutdownPolicy::Drain => {
            // Appends are refused once running is cleared, so this terminates.
            loop {
                let claimed = {
                    let mut pending = shared.channel.lock_signal();
                    let remaining = pending.len();
                    if remaining == 0 {
                        break;
                    }
                    tracing::debug!("GPU worker draining {} commands before exit", remaining);
                    pending.drain_into_inflight(in_flight)
                };
                execute_batch(shared, in_flight);
                shared.channel.retire(claimed);
            }
        }
    }
}

/// Executes the claimed batch strictly in order, leaving `in_flight` empty.
fn execute_batch<B: Backend>(shared: &Shared<B>, in_flight: &mut Vec<Command>) {
    for command in in_flight.drain(..) {
        let kind = command.kind();
        command.execute(&*shared.backend);
        shared.stats.record_worker_execution(kind);
    }
}
