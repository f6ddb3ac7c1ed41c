//! GPFIFO command lists.
//!
//! A command list is what the guest hands to the GPU channel: an ordered run
//! of 64-bit GPFIFO entries, each pointing at a span of pushbuffer words in
//! GPU memory. The relay transports lists opaquely; decoding the pushbuffer
//! belongs to the backend.
//!
//! ## Entry Layout
//!
//! ```text
//!  63  62                 42  41  40  39                              0
//! ┌───┬─────────────────────┬───┬───┬─────────────────────────────────┐
//! │ - │ size (words, 21b)   │ N │ - │ GPU virtual address (40b)       │
//! └───┴─────────────────────┴───┴───┴─────────────────────────────────┘
//!                                 N = non-main (subroutine) fetch
//! ```

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::GPU_VADDR_BITS;

const ADDR_MASK: u64 = (1 << GPU_VADDR_BITS) - 1;
const NON_MAIN_BIT: u32 = 41;
const SIZE_SHIFT: u32 = 42;
const SIZE_MASK: u64 = (1 << 21) - 1;

/// Errors building a command list from raw guest data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandListError {
    /// The byte buffer does not hold a whole number of entries.
    #[error("command list of {len} bytes is not a multiple of 8")]
    TruncatedEntry {
        /// Length of the rejected buffer.
        len: usize,
    },
}

/// One raw GPFIFO entry.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct CommandListEntry(pub u64);

impl CommandListEntry {
    /// Encodes an entry.
    ///
    /// Bits of `gpu_addr` above bit 39 and of `size_words` above bit 20 are
    /// discarded, exactly as the hardware would ignore them.
    #[must_use]
    pub const fn new(gpu_addr: u64, size_words: u32, non_main: bool) -> Self {
        let mut raw = gpu_addr & ADDR_MASK;
        raw |= ((size_words as u64) & SIZE_MASK) << SIZE_SHIFT;
        if non_main {
            raw |= 1 << NON_MAIN_BIT;
        }
        Self(raw)
    }

    /// GPU virtual address of the pushbuffer segment.
    #[must_use]
    pub const fn gpu_addr(self) -> u64 {
        self.0 & ADDR_MASK
    }

    /// Length of the pushbuffer segment in 32-bit words.
    #[must_use]
    pub const fn size_words(self) -> u32 {
        ((self.0 >> SIZE_SHIFT) & SIZE_MASK) as u32
    }

    /// Whether the segment is fetched as a non-main (subroutine) buffer.
    #[must_use]
    pub const fn is_non_main(self) -> bool {
        (self.0 >> NON_MAIN_BIT) & 1 != 0
    }
}

/// An owned, ordered list of GPFIFO entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandList {
    entries: Vec<CommandListEntry>,
}

impl CommandList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Wraps already-decoded entries.
    #[must_use]
    pub fn from_entries(entries: Vec<CommandListEntry>) -> Self {
        Self { entries }
    }

    /// Copies raw 64-bit words into a list.
    #[must_use]
    pub fn from_words(words: &[u64]) -> Self {
        Self {
            entries: bytemuck::cast_slice::<u64, CommandListEntry>(words).to_vec(),
        }
    }

    /// Parses a little-endian byte buffer as read from guest memory.
    ///
    /// # Errors
    ///
    /// Returns [`CommandListError::TruncatedEntry`] if the buffer length is
    /// not a multiple of 8.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, CommandListError> {
        const ENTRY_SIZE: usize = std::mem::size_of::<CommandListEntry>();

        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(CommandListError::TruncatedEntry { len: bytes.len() });
        }

        // Guest buffers carry no alignment guarantee.
        let entries = bytes
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| CommandListEntry(u64::from_le(bytemuck::pod_read_unaligned(chunk))))
            .collect();

        Ok(Self { entries })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total pushbuffer words referenced by all entries.
    #[must_use]
    pub fn total_words(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.size_words())).sum()
    }

    /// Iterates over the entries in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, CommandListEntry> {
        self.entries.iter()
    }

    /// Returns the entries.
    #[must_use]
    pub fn entries(&self) -> &[CommandListEntry] {
        &self.entries
    }
}

impl From<Vec<CommandListEntry>> for CommandList {
    fn from(entries: Vec<CommandListEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl IntoIterator for CommandList {
    type Item = CommandListEntry;
    type IntoIter = std::vec::IntoIter<CommandListEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a CommandListEntry;
    type IntoIter = std::slice::Iter<'a, CommandListEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
