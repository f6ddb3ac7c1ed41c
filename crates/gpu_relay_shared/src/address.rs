//! Guest memory addresses and regions.
//!
//! Cache maintenance commands name a span of guest (CPU-visible) memory.
//! The engine never dereferences these; it only carries them to the backend.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Guest virtual address.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GuestAddr(pub u64);

impl GuestAddr {
    /// Null address.
    pub const NULL: Self = Self(0);

    /// Creates a new address.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for GuestAddr {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::LowerHex for GuestAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for GuestAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A `[addr, addr + size)` span of guest memory.
///
/// A zero-sized region is valid and simply covers nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// First byte of the region.
    pub addr: GuestAddr,
    /// Length in bytes.
    pub size: u64,
}

impl Region {
    /// Creates a new region.
    #[must_use]
    pub const fn new(addr: u64, size: u64) -> Self {
        Self {
            addr: GuestAddr(addr),
            size,
        }
    }

    /// One past the last byte. Saturates at the top of the address space.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.addr.0.saturating_add(self.size)
    }

    /// Returns true if the region covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.addr.0, self.end())
    }
}
