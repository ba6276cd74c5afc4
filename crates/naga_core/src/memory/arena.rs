//! # Byte Arena
//!
//! A chained bump allocator for immutable byte strings that live as long as
//! the arena.

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};

/// Default size of one arena buffer in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// A bump-pointer arena over a growing list of fixed-size buffers.
///
/// Allocations are fast (just split the unused tail of the newest buffer).
/// Nothing is freed individually: every buffer is released when the arena
/// drops, so stored bytes stay put until then.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Wrap it in a mutex to share it.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = ByteArena::new(1024);
///
/// // Copies the bytes plus a trailing NUL
/// let stored = arena.alloc_with_nul(b"bird/bird_hero.png");
/// assert_eq!(stored.len(), 19);
/// ```
pub struct ByteArena {
    /// Size of a regular buffer in bytes.
    buffer_size: usize,
    /// Every buffer allocated so far, newest last.
    buffers: Vec<NonNull<[u8]>>,
    /// Start of the unused tail of the newest buffer.
    cursor: NonNull<u8>,
    /// Length of the unused tail.
    remaining: usize,
    /// Bytes handed out across all buffers.
    used: usize,
}

// SAFETY: the arena owns its buffers outright; the raw pointers are never
// shared with another arena.
unsafe impl Send for ByteArena {}

impl ByteArena {
    /// Creates an arena whose buffers are `buffer_size` bytes each.
    ///
    /// The first buffer is allocated immediately.
    ///
    /// # Arguments
    ///
    /// * `buffer_size` - Size of each buffer in bytes
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        let mut arena = Self {
            buffer_size,
            buffers: Vec::new(),
            cursor: NonNull::dangling(),
            remaining: 0,
            used: 0,
        };
        arena.grow(buffer_size);
        arena
    }

    /// Returns the size of a regular buffer in bytes.
    #[inline]
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the number of buffers allocated so far.
    #[inline]
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the bytes handed out so far, terminators included.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Returns the free space left in the newest buffer.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Copies `bytes` followed by a NUL terminator into the arena.
    ///
    /// A new buffer is started when the newest one lacks room for the bytes
    /// plus terminator. Inputs larger than a regular buffer get a buffer of
    /// their own.
    ///
    /// # Returns
    ///
    /// The stored copy, terminator included. It stays valid and unchanged
    /// until the arena is dropped, even as later copies are added.
    pub fn alloc_with_nul(&mut self, bytes: &[u8]) -> NonNull<[u8]> {
        let needed = bytes.len() + 1;
        if needed >= self.remaining {
            self.grow(self.buffer_size.max(needed));
            tracing::trace!(
                buffers = self.buffers.len(),
                size = self.remaining,
                "arena buffer allocated"
            );
        }

        let stored = self.cursor;
        // SAFETY: the tail starting at `cursor` has `remaining >= needed`
        // unused bytes that no earlier allocation overlaps.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), stored.as_ptr(), bytes.len());
            stored.as_ptr().add(bytes.len()).write(0);
            self.cursor = NonNull::new_unchecked(stored.as_ptr().add(needed));
        }
        self.remaining -= needed;
        self.used += needed;
        NonNull::slice_from_raw_parts(stored, needed)
    }

    /// Starts a new zeroed buffer of `size` bytes; the rest of the previous
    /// one is abandoned.
    fn grow(&mut self, size: usize) {
        let buffer = NonNull::from(Box::leak(vec![0u8; size].into_boxed_slice()));
        self.buffers.push(buffer);
        self.cursor = buffer.cast();
        self.remaining = size;
    }
}

impl Drop for ByteArena {
    fn drop(&mut self) {
        for buffer in self.buffers.drain(..) {
            // SAFETY: every buffer came from `Box::leak` in `grow` and is
            // released exactly once.
            drop(unsafe { Box::from_raw(buffer.as_ptr()) });
        }
    }
}

impl Default for ByteArena {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}
