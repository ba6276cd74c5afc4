//! # Block Pool
//!
//! Fixed-size cell allocator for objects that are frequently allocated and freed.
//!
//! Cells are carved out of heap blocks. A released cell goes onto a free list
//! threaded through its own memory and is handed out again before any fresh
//! cell. Blocks are never returned mid-lifetime: all of them are released at
//! once when the pool is dropped.

#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

use crate::error::{RuntimeError, RuntimeResult};

/// Alignment of every block handed out by the system allocator.
///
/// Cells never get a stricter alignment than this.
pub const BLOCK_ALIGN: usize = 16;

/// Header at the start of every block. Blocks are chained through it so the
/// pool can release them on drop.
#[repr(C)]
struct BlockHeader {
    next: Option<NonNull<BlockHeader>>,
}

/// A pool of fixed-size memory cells.
///
/// Every cell has the same size, fixed at construction. The pool hands out
/// uninitialized memory; constructing and destroying values in it is the
/// caller's business.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex
/// (the [`PoolRegistry`](super::PoolRegistry) does the latter).
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = BlockPool::new(32, 4)?;
///
/// // Allocate - O(1), a new block only every 4 cells
/// let cell = pool.alloc().expect("out of memory");
///
/// // Free - O(1), the cell goes back on the free list
/// unsafe { pool.free(cell.as_ptr()) };
/// ```
pub struct BlockPool {
    /// Size of one cell, at least one pointer wide.
    object_size: usize,
    /// Cells per block.
    object_count: usize,
    /// Bytes reserved at the start of a block for the header.
    block_leader: usize,
    /// Alignment every cell is guaranteed to have.
    cell_align: usize,
    /// Layout of a whole block (leader + cells).
    block_layout: Layout,
    /// Newest block first.
    blocks: Option<NonNull<BlockHeader>>,
    /// Number of blocks owned.
    block_count: usize,
    /// First cell of the newest block.
    free_block: *mut u8,
    /// Bytes of the newest block not yet handed out. Counts down to zero.
    free_pos: usize,
    /// Head of the list of released cells.
    free_list: Option<NonNull<u8>>,
    /// Length of the free list.
    free_list_len: usize,
    /// Cells currently handed out.
    live_count: usize,
}

// SAFETY: the pool exclusively owns its blocks and the raw pointers it holds
// only point into them; moving the pool to another thread moves that ownership.
unsafe impl Send for BlockPool {}

impl BlockPool {
    /// Creates a pool of cells of `object_size` bytes, `object_count` per block.
    ///
    /// No memory is allocated until the first [`alloc`](Self::alloc).
    ///
    /// # Arguments
    ///
    /// * `object_size` - Size of one cell; rounded up to one pointer width
    /// * `object_count` - Number of cells carved from each block
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ZeroCapacity`] when `object_count` is zero, and
    /// [`RuntimeError::LayoutOverflow`] when a block would not fit in memory.
    pub fn new(object_size: usize, object_count: usize) -> RuntimeResult<Self> {
        if object_count == 0 {
            return Err(RuntimeError::ZeroCapacity);
        }

        // A released cell must be able to hold the free-list link.
        let object_size = object_size.max(mem::size_of::<*mut u8>());

        // Lowest set bit of the size is the natural alignment of the cells.
        let lsb = object_size & object_size.wrapping_neg();
        let leader_align = lsb.clamp(4, BLOCK_ALIGN);
        let block_leader = mem::size_of::<BlockHeader>().div_ceil(leader_align) * leader_align;

        let overflow = RuntimeError::LayoutOverflow {
            object_size,
            object_count,
        };
        let block_size = object_size
            .checked_mul(object_count)
            .and_then(|cells| cells.checked_add(block_leader))
            .ok_or_else(|| overflow.clone())?;
        let block_layout =
            Layout::from_size_align(block_size, BLOCK_ALIGN).map_err(|_| overflow)?;

        Ok(Self {
            object_size,
            object_count,
            block_leader,
            cell_align: lsb.min(BLOCK_ALIGN),
            block_layout,
            blocks: None,
            block_count: 0,
            free_block: ptr::null_mut(),
            free_pos: 0,
            free_list: None,
            free_list_len: 0,
            live_count: 0,
        })
    }

    /// Size of one cell in bytes.
    #[inline]
    #[must_use]
    pub const fn object_size(&self) -> usize {
        self.object_size
    }

    /// Number of cells carved from each block.
    #[inline]
    #[must_use]
    pub const fn objects_per_block(&self) -> usize {
        self.object_count
    }

    /// Bytes reserved for the block header ahead of the first cell.
    #[inline]
    #[must_use]
    pub const fn block_leader(&self) -> usize {
        self.block_leader
    }

    /// Alignment every cell handed out by this pool satisfies.
    #[inline]
    #[must_use]
    pub const fn cell_align(&self) -> usize {
        self.cell_align
    }

    /// Number of blocks allocated so far.
    #[inline]
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.block_count
    }

    /// Cells in the newest block that have never been handed out.
    #[inline]
    #[must_use]
    pub const fn bump_remaining(&self) -> usize {
        self.free_pos / self.object_size
    }

    /// Number of released cells waiting on the free list.
    #[inline]
    #[must_use]
    pub const fn free_list_len(&self) -> usize {
        self.free_list_len
    }

    /// Number of cells currently handed out.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Allocates one cell.
    ///
    /// Released cells are reused first, most recently released first. Then the
    /// newest block is consumed from its end towards its start. A new block is
    /// requested from the system only when both are exhausted.
    ///
    /// # Returns
    ///
    /// An uninitialized cell of [`object_size`](Self::object_size) bytes, or
    /// `None` if the system allocator refused a new block.
    pub fn alloc(&mut self) -> Option<NonNull<u8>> {
        if let Some(cell) = self.free_list {
            // SAFETY: every cell on the free list had its link written by `free`.
            let next = unsafe { ptr::read_unaligned(cell.as_ptr().cast::<*mut u8>()) };
            self.free_list = NonNull::new(next);
            self.free_list_len -= 1;
            self.live_count += 1;
            return Some(cell);
        }

        if self.free_pos == 0 {
            self.grow()?;
        }

        self.free_pos -= self.object_size;
        self.live_count += 1;
        // SAFETY: free_pos < object_count * object_size, so the cell lies inside
        // the cell area of the newest block.
        NonNull::new(unsafe { self.free_block.add(self.free_pos) })
    }

    /// Returns a cell to the pool. Null is a no-op.
    ///
    /// # Safety
    ///
    /// `cell` must be null or a pointer obtained from [`alloc`](Self::alloc) on
    /// this same pool that has not been freed since. Any value stored in the
    /// cell must already have been dropped.
    pub unsafe fn free(&mut self, cell: *mut u8) {
        let Some(cell) = NonNull::new(cell) else {
            return;
        };

        let next = self.free_list.map_or(ptr::null_mut(), NonNull::as_ptr);
        // SAFETY: the caller guarantees the cell belongs to this pool, and every
        // cell is at least one pointer wide. Cells may be less than pointer
        // aligned, hence the unaligned write.
        unsafe { ptr::write_unaligned(cell.as_ptr().cast::<*mut u8>(), next) };
        self.free_list = Some(cell);
        self.free_list_len += 1;
        self.live_count = self.live_count.saturating_sub(1);
    }

    /// Checks whether `ptr` points at a cell inside one of this pool's blocks.
    #[must_use]
    pub fn owns(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        let cells = self.object_size * self.object_count;
        let mut block = self.blocks;
        while let Some(header) = block {
            let start = header.as_ptr() as usize + self.block_leader;
            if addr >= start && addr < start + cells {
                return (addr - start) % self.object_size == 0;
            }
            // SAFETY: blocks in the chain stay alive until the pool is dropped.
            block = unsafe { header.as_ref().next };
        }
        false
    }

    /// Requests a fresh block from the system and makes it the newest block.
    fn grow(&mut self) -> Option<()> {
        // SAFETY: the layout is never zero-sized; the leader alone is non-empty.
        let raw = unsafe { alloc(self.block_layout) };
        let Some(block) = NonNull::new(raw.cast::<BlockHeader>()) else {
            tracing::warn!(
                object_size = self.object_size,
                blocks = self.block_count,
                "system allocator refused a pool block"
            );
            return None;
        };

        // SAFETY: the block is BLOCK_ALIGN aligned and starts with room for the header.
        unsafe { block.as_ptr().write(BlockHeader { next: self.blocks }) };
        self.blocks = Some(block);
        self.block_count += 1;
        // SAFETY: the leader lies within the block.
        self.free_block = unsafe { raw.add(self.block_leader) };
        self.free_pos = self.object_count * self.object_size;

        tracing::trace!(
            object_size = self.object_size,
            blocks = self.block_count,
            "pool block allocated"
        );
        Some(())
    }
}

impl Drop for BlockPool {
    fn drop(&mut self) {
        self.free_list = None;
        self.free_block = ptr::null_mut();
        self.free_pos = 0;

        let mut block = self.blocks.take();
        while let Some(header) = block {
            // SAFETY: every block in the chain was allocated in `grow` with
            // `block_layout` and is released exactly once here.
            unsafe {
                block = header.as_ref().next;
                dealloc(header.as_ptr().cast::<u8>(), self.block_layout);
            }
        }

        if self.block_count > 0 {
            tracing::debug!(
                object_size = self.object_size,
                blocks = self.block_count,
                leaked_cells = self.live_count,
                "pool released"
            );
        }
    }
}

impl fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("object_size", &self.object_size)
            .field("objects_per_block", &self.object_count)
            .field("blocks", &self.block_count)
            .field("live", &self.live_count)
            .field("free_list", &self.free_list_len)
            .finish_non_exhaustive()
    }
}
