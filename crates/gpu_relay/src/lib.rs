//! # GPU Relay
//!
//! Moves rendering work from the emulated CPU thread to a dedicated GPU
//! thread without making the CPU thread pay for it:
//! - Command lists are fire-and-forget
//! - Buffer swaps and cache flushes block until everything before them ran
//! - Cheap operations run inline when nothing is queued
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  submit   ┌────────────────────────────┐
//! │  CPU thread  │ ────────► │         Dispatcher         │
//! │ (any number) │           │  inline? ─► Backend (here) │
//! └──────────────┘           │  else ──► pending buffer   │
//!                            └─────────────┬──────────────┘
//!                                 signal   │  swap
//!                            ┌─────────────▼──────────────┐
//!                            │   GPU worker (one thread)  │
//!                            │  in-flight ─► Backend      │
//!                            └─────────────┬──────────────┘
//!                                   idle   │
//!                              waiters ◄───┘
//! ```
//!
//! ## Rules
//!
//! 1. **One executor at a time** - worker or inline caller, never both
//! 2. **FIFO per thread** - appends are ordered by the signal lock
//! 3. **Shutdown wins** - anything submitted after shutdown is dropped
//!
//! ## Example
//!
//! ```rust,ignore
//! use gpu_relay::{GpuThread, HeadlessContext, RelayConfig};
//!
//! let gpu = GpuThread::spawn(Arc::new(renderer), HeadlessContext, RelayConfig::default())?;
//! gpu.submit_list(list);
//! gpu.swap_buffers(None);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
mod channel;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gpu_thread;
pub mod stats;
pub mod worker;

pub use backend::{Backend, HeadlessContext, RenderContext};
pub use command::{Command, CommandKind};
pub use config::{RelayConfig, ShutdownPolicy};
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::{RelayError, RelayResult};
pub use gpu_thread::GpuThread;
pub use stats::{DispatchStats, StatsSnapshot};
pub use worker::WorkerPhase;

pub use gpu_relay_shared::{
    CommandList, CommandListEntry, FramebufferConfig, GuestAddr, PixelFormat, Region,
};
