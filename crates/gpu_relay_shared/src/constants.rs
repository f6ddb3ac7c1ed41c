//! # Relay Constants
//!
//! Defaults shared by the engine and its configuration layer.

// =============================================================================
// WORKER THREAD
// =============================================================================

/// Name given to the dedicated GPU worker thread.
pub const DEFAULT_THREAD_NAME: &str = "GPU";

/// Commands pre-allocated in each of the pending/in-flight buffers.
///
/// One frame of a busy title submits a few dozen lists plus the cache
/// maintenance around them. 256 keeps steady-state appends allocation-free.
pub const DEFAULT_PENDING_CAPACITY: usize = 256;

// =============================================================================
// GUEST ADDRESS SPACE
// =============================================================================

/// Width of a GPU virtual address as encoded in a GPFIFO entry.
pub const GPU_VADDR_BITS: u32 = 40;
