//! # GPU Relay Shared
//!
//! Payload types carried by relay commands.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `parking_lot`, `crossbeam-channel` or anything that synchronizes
//! - Any GPU, window or context crate
//!
//! Everything here is an owned value that can be moved to another thread
//! and consumed there. If you need locks, put them in `gpu_relay`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod address;
pub mod command_list;
pub mod constants;
pub mod framebuffer;

pub use address::{GuestAddr, Region};
pub use command_list::{CommandList, CommandListEntry, CommandListError};
pub use constants::{DEFAULT_PENDING_CAPACITY, DEFAULT_THREAD_NAME, GPU_VADDR_BITS};
pub use framebuffer::{FramebufferConfig, PixelFormat, TransformFlags};
