//! # GPU Thread
//!
//! Owns the worker thread. Construction spawns the worker and waits until it
//! holds the rendering context; dropping (or [`GpuThread::shutdown`]) stops
//! and joins it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let gpu = GpuThread::spawn(renderer, window_context, RelayConfig::load("gpu.toml")?)?;
//!
//! // Emulated CPU thread:
//! gpu.submit_list(entries);             // returns immediately
//! gpu.flush_region(addr, size);          // returns once the flush is done
//! gpu.swap_buffers(Some(framebuffer));   // returns once the frame is presented
//! ```

use std::ops::Deref;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::backend::{Backend, RenderContext};
use crate::config::RelayConfig;
use crate::dispatcher::{Dispatcher, Shared};
use crate::error::{RelayError, RelayResult};
use crate::worker;

/// A running GPU worker and the dispatcher feeding it.
pub struct GpuThread<B: Backend> {
    dispatcher: Dispatcher<B>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<B: Backend> GpuThread<B> {
    /// Spawns the worker thread.
    ///
    /// Returns once the worker has made `context` current, so the first
    /// submitted command never races context acquisition.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Spawn`] if the thread cannot be created
    /// - [`RelayError::ContextUnavailable`] (or whatever the context returns)
    ///   if the context cannot be acquired
    /// - [`RelayError::WorkerDied`] if the worker exits without reporting
    pub fn spawn<C: RenderContext>(
        backend: Arc<B>,
        context: C,
        config: RelayConfig,
    ) -> RelayResult<Self> {
        let shared = Arc::new(Shared::new(backend, &config));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let worker_shared = Arc::clone(&shared);
        let policy = config.shutdown_policy;
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker::run(worker_shared, context, policy, ready_tx))
            .map_err(RelayError::Spawn)?;

        shared.record_worker_thread(handle.thread().id());

        let startup = ready_rx.recv().unwrap_or(Err(RelayError::WorkerDied));
        if let Err(err) = startup {
            let _ = handle.join();
            return Err(err);
        }

        tracing::info!(
            "GPU relay online: thread={}, strict_coherency={}, shutdown={:?}",
            config.thread_name,
            config.strict_coherency,
            config.shutdown_policy
        );

        Ok(Self {
            dispatcher: Dispatcher { shared },
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Idempotent; concurrent callers return once the worker has been
    /// joined. Afterwards every submission is discarded and the backend is
    /// not touched again.
    pub fn shutdown(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        let channel = &self.dispatcher.shared.channel;
        {
            let mut pending = channel.lock_signal();
            pending.stop();
        }
        channel.signal_work();

        if self.dispatcher.is_worker_thread() {
            // Joining ourselves would never return; the loop exits on its own
            // once the current command finishes.
            tracing::warn!("GPU relay shut down from its own worker thread, not joining");
        } else if handle.join().is_err() {
            tracing::warn!("GPU worker thread panicked");
        }
    }

    /// Returns a cloneable dispatcher handle.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher<B> {
        self.dispatcher.clone()
    }
}

impl<B: Backend> Deref for GpuThread<B> {
    type Target = Dispatcher<B>;

    fn deref(&self) -> &Self::Target {
        &self.dispatcher
    }
}

impl<B: Backend> Drop for GpuThread<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
