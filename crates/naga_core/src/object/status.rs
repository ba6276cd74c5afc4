//! # Status Bits
//!
//! Lifecycle flags for managed objects, packed into one word.

use std::fmt;

/// Set of lifecycle flags.
///
/// # Example
///
/// ```rust,ignore
/// let mut status = BitStatus::default();
/// status.set(BitStatus::INITIALIZED | BitStatus::ALIVE);
/// assert!(status.is_set(BitStatus::ALIVE));
/// status.unset(BitStatus::ALIVE);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BitStatus(u32);

impl BitStatus {
    /// No flags.
    pub const NONE: u32 = 0;
    /// Not yet initialized; same as no flags.
    pub const UNINITIALIZED: u32 = 0;
    /// Initialization finished.
    pub const INITIALIZED: u32 = 1;
    /// Resources realized; same bit as [`INITIALIZED`](Self::INITIALIZED).
    pub const REALIZED: u32 = Self::INITIALIZED;
    /// Waiting for work.
    pub const IDLE: u32 = 1 << 1;
    /// Participating in the frame.
    pub const ALIVE: u32 = 1 << 2;
    /// First bit free for callers.
    pub const USER_DEFINED: u32 = 1 << 3;

    /// Creates a status holding exactly `bits`.
    #[inline]
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag word.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Sets every bit of `flags`.
    #[inline]
    pub fn set(&mut self, flags: u32) {
        self.0 |= flags;
    }

    /// Sets or clears every bit of `flags`.
    #[inline]
    pub fn set_to(&mut self, flags: u32, on: bool) {
        if on {
            self.set(flags);
        } else {
            self.unset(flags);
        }
    }

    /// Clears every bit of `flags`.
    #[inline]
    pub fn unset(&mut self, flags: u32) {
        self.0 &= !flags;
    }

    /// Clears all flags.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = Self::NONE;
    }

    /// Checks whether every bit of `flags` is set.
    #[inline]
    #[must_use]
    pub const fn is_set(self, flags: u32) -> bool {
        self.0 & flags == flags
    }

    /// Checks whether any flag is set.
    #[inline]
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        self.0 != Self::NONE
    }
}

impl From<u32> for BitStatus {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for BitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitStatus({:#06b})", self.0)
    }
}
