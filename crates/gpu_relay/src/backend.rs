//! Capabilities the relay consumes: the rendering backend and the context
//! the worker thread renders through.
//!
//! ## Threading Contract
//!
//! ```text
//!   CPU thread ──(inline)──┐
//!                          ├──► Backend   (never two at once)
//!   GPU worker ────────────┘
//! ```
//!
//! Backend methods take `&self` because they are reached from whichever
//! thread currently owns execution, including a handler that re-enters the
//! relay from inside a command. The relay guarantees that no two threads
//! execute commands concurrently; any mutable state lives behind the
//! backend's own interior mutability.

use gpu_relay_shared::{CommandList, FramebufferConfig, GuestAddr};

use crate::error::RelayResult;

/// Host rendering backend driven by the relay.
pub trait Backend: Send + Sync + 'static {
    /// Queues a command list for decoding.
    fn push_command_list(&self, list: CommandList);

    /// Decodes and executes everything pushed so far.
    fn dispatch_calls(&self);

    /// Presents a frame. `None` re-presents the previous framebuffer.
    fn swap_buffers(&self, framebuffer: Option<FramebufferConfig>);

    /// Writes cached GPU data for the region back to guest memory.
    fn flush_region(&self, addr: GuestAddr, size: u64);

    /// Drops cached GPU data for the region.
    fn invalidate_region(&self, addr: GuestAddr, size: u64);

    /// Flushes, then invalidates, the region.
    fn flush_and_invalidate_region(&self, addr: GuestAddr, size: u64);
}

/// Rendering context acquired once by the worker thread.
///
/// `make_current` runs on the worker before it executes any command. The
/// returned scope lives until the worker exits and is dropped on that
/// thread, which releases the context.
pub trait RenderContext: Send + 'static {
    /// Guard holding the context current.
    type Scope;

    /// Makes the context current on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RelayError::ContextUnavailable`] if the context cannot
    /// be acquired; engine construction then fails with the same error.
    fn make_current(self) -> RelayResult<Self::Scope>;
}

/// Context for backends that need no window (tests, offscreen rendering).
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessContext;

impl RenderContext for HeadlessContext {
    type Scope = ();

    fn make_current(self) -> RelayResult<()> {
        Ok(())
    }
}
