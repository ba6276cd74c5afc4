//! # Typed Pools
//!
//! One [`BlockPool`] per `(type, capacity)` pair, created on first use.
//!
//! The [`PoolRegistry`] owns the pools. A process-wide registry is reachable
//! through [`pool_registry`], and [`TypedPool`] is a zero-sized façade over it
//! for call sites that know their type and capacity statically.

#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use super::block_pool::{BlockPool, BLOCK_ALIGN};
use crate::config::{RuntimeConfig, DEFAULT_OBJECTS_PER_BLOCK};
use crate::error::RuntimeResult;
use crate::singleton::Singleton;

/// Key of one pool in a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolKey {
    /// Type the pool serves.
    pub type_id: TypeId,
    /// Cells per block.
    pub capacity: usize,
}

/// Snapshot of one pool's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Size of one cell in bytes.
    pub object_size: usize,
    /// Blocks allocated so far.
    pub blocks: usize,
    /// Cells currently handed out.
    pub live: usize,
    /// Released cells waiting for reuse.
    pub free_list: usize,
    /// Never-used cells left in the newest block.
    pub bump_remaining: usize,
}

/// Shared handle to one pool.
pub type SharedPool = Arc<Mutex<BlockPool>>;

/// Registry of typed pools.
///
/// # Thread Safety
///
/// The pool table and every pool sit behind their own lock, so a registry can
/// be shared across threads. Values allocated from it are not synchronized.
pub struct PoolRegistry {
    /// One pool per (type, capacity).
    pools: Mutex<HashMap<PoolKey, SharedPool>>,
    /// Strictest alignment served from pools; stricter types use the heap.
    max_alignment: usize,
    /// Capacity used when a caller does not name one.
    default_capacity: usize,
}

impl PoolRegistry {
    /// Creates an empty registry serving alignments up to the block alignment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_alignment(BLOCK_ALIGN)
    }

    /// Creates an empty registry serving alignments up to `max_alignment`.
    ///
    /// The limit never exceeds the block alignment.
    #[must_use]
    pub fn with_max_alignment(max_alignment: usize) -> Self {
        Self::with_limits(DEFAULT_OBJECTS_PER_BLOCK, max_alignment)
    }

    /// Creates an empty registry from the pool settings of `config`.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_limits(config.default_objects_per_block, config.max_alignment)
    }

    fn with_limits(default_capacity: usize, max_alignment: usize) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            max_alignment: max_alignment.min(BLOCK_ALIGN),
            default_capacity,
        }
    }

    /// Capacity used by [`allocate_default`](Self::allocate_default).
    #[inline]
    #[must_use]
    pub const fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Strictest alignment served from pools.
    #[inline]
    #[must_use]
    pub const fn max_alignment(&self) -> usize {
        self.max_alignment
    }

    /// Number of pools created so far.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    /// Returns the pool for `T` with `capacity` cells per block, creating it
    /// on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`BlockPool::new`] errors (zero capacity, layout overflow).
    pub fn pool_for<T: 'static>(&self, capacity: usize) -> RuntimeResult<SharedPool> {
        let key = PoolKey {
            type_id: TypeId::of::<T>(),
            capacity,
        };

        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&key) {
            return Ok(Arc::clone(pool));
        }

        let pool = Arc::new(Mutex::new(BlockPool::new(mem::size_of::<T>(), capacity)?));
        pools.insert(key, Arc::clone(&pool));
        tracing::debug!(
            ty = type_name::<T>(),
            capacity,
            object_size = mem::size_of::<T>(),
            "typed pool created"
        );
        Ok(pool)
    }

    /// Returns the counters of the pool for `T`, if it exists.
    #[must_use]
    pub fn stats<T: 'static>(&self, capacity: usize) -> Option<PoolStats> {
        let key = PoolKey {
            type_id: TypeId::of::<T>(),
            capacity,
        };
        let pool = Arc::clone(self.pools.lock().get(&key)?);
        let pool = pool.lock();
        Some(PoolStats {
            object_size: pool.object_size(),
            blocks: pool.block_count(),
            live: pool.live_count(),
            free_list: pool.free_list_len(),
            bump_remaining: pool.bump_remaining(),
        })
    }

    /// Allocates uninitialized memory for one `T`.
    ///
    /// Types aligned more strictly than the pools allow come from the general
    /// allocator instead.
    ///
    /// # Returns
    ///
    /// The memory, or `None` if the pool could not be created or the system
    /// allocator failed.
    pub fn allocate<T: 'static>(&self, capacity: usize) -> Option<NonNull<T>> {
        self.allocate_layout::<T>(capacity, Layout::new::<T>())
            .map(NonNull::cast)
    }

    /// Returns memory obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate::<T>(capacity)` on this registry, with
    /// the same `capacity`, and its value must already be dropped.
    pub unsafe fn deallocate<T: 'static>(&self, capacity: usize, ptr: NonNull<T>) {
        // SAFETY: forwarded caller contract.
        unsafe { self.deallocate_layout::<T>(capacity, ptr.cast(), Layout::new::<T>()) };
    }

    /// Allocates one `T` from the pool with the default capacity.
    pub fn allocate_default<T: 'static>(&self) -> Option<NonNull<T>> {
        self.allocate::<T>(self.default_capacity)
    }

    /// Returns memory obtained from [`allocate_default`](Self::allocate_default).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_default::<T>()` on this registry and its
    /// value must already be dropped.
    pub unsafe fn deallocate_default<T: 'static>(&self, ptr: NonNull<T>) {
        // SAFETY: forwarded caller contract.
        unsafe { self.deallocate::<T>(self.default_capacity, ptr) };
    }

    /// Allocates memory for a value of `layout`, on behalf of type `T`.
    ///
    /// Pools are keyed to one exact object size: a request whose size differs
    /// from `T` (a larger value allocated through `T`'s hook, say) or whose
    /// alignment the pool cannot honor falls back to the general allocator.
    pub fn allocate_layout<T: 'static>(
        &self,
        capacity: usize,
        layout: Layout,
    ) -> Option<NonNull<u8>> {
        if !self.serves::<T>(layout) {
            return heap_alloc(layout);
        }

        let pool = match self.pool_for::<T>(capacity) {
            Ok(pool) => pool,
            Err(err) => {
                tracing::warn!(ty = type_name::<T>(), %err, "typed pool unavailable");
                return None;
            }
        };
        let mut pool = pool.lock();
        pool.alloc()
    }

    /// Returns memory obtained from [`allocate_layout`](Self::allocate_layout).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_layout::<T>(capacity, layout)` on this
    /// registry with the same arguments, and must not be used afterwards.
    pub unsafe fn deallocate_layout<T: 'static>(
        &self,
        capacity: usize,
        ptr: NonNull<u8>,
        layout: Layout,
    ) {
        if !self.serves::<T>(layout) {
            // SAFETY: memory of this layout came from `heap_alloc`.
            unsafe { heap_dealloc(ptr, layout) };
            return;
        }

        let key = PoolKey {
            type_id: TypeId::of::<T>(),
            capacity,
        };
        let pool = self.pools.lock().get(&key).map(Arc::clone);
        if let Some(pool) = pool {
            // SAFETY: the caller guarantees the cell came from this pool.
            unsafe { pool.lock().free(ptr.as_ptr()) };
        } else {
            tracing::warn!(ty = type_name::<T>(), capacity, "deallocation for a pool that was never created");
        }
    }

    /// Checks whether a request of `layout` on behalf of `T` is served by a pool.
    fn serves<T>(&self, layout: Layout) -> bool {
        layout.size() == mem::size_of::<T>() && layout.align() <= self.pool_alignment::<T>()
    }

    /// Alignment the cells of `T`'s pool are guaranteed to have.
    fn pool_alignment<T>(&self) -> usize {
        let size = mem::size_of::<T>().max(mem::size_of::<*mut u8>());
        let lsb = size & size.wrapping_neg();
        lsb.min(self.max_alignment)
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pool_count())
            .field("default_capacity", &self.default_capacity)
            .field("max_alignment", &self.max_alignment)
            .finish()
    }
}

/// General-purpose allocation used when a pool cannot serve a request.
fn heap_alloc(layout: Layout) -> Option<NonNull<u8>> {
    if layout.size() == 0 {
        return NonNull::new(layout.align() as *mut u8);
    }
    // SAFETY: the layout has a non-zero size.
    let ptr = NonNull::new(unsafe { alloc(layout) });
    if ptr.is_none() {
        tracing::warn!(size = layout.size(), "system allocator refused an object");
    }
    ptr
}

/// Releases memory from [`heap_alloc`].
///
/// # Safety
///
/// `ptr` must come from `heap_alloc(layout)` with the same layout.
unsafe fn heap_dealloc(ptr: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
        // SAFETY: forwarded caller contract.
        unsafe { dealloc(ptr.as_ptr(), layout) };
    }
}

static GLOBAL_POOLS: Singleton<PoolRegistry> = Singleton::new(PoolRegistry::new);

/// Returns the process-wide pool registry, creating it on first use.
#[must_use]
pub fn pool_registry() -> Arc<PoolRegistry> {
    GLOBAL_POOLS.instance()
}

/// Zero-sized façade over the process-wide pool for `T` with `N` cells per
/// block.
///
/// # Example
///
/// ```rust,ignore
/// struct Particle { x: f32, y: f32, life: f32 }
///
/// let cell = TypedPool::<Particle, 64>::allocate().expect("out of memory");
/// unsafe {
///     cell.as_ptr().write(Particle { x: 0.0, y: 0.0, life: 1.0 });
///     cell.as_ptr().drop_in_place();
///     TypedPool::<Particle, 64>::delete(cell);
/// }
/// ```
pub struct TypedPool<T, const N: usize>(PhantomData<fn() -> T>);

impl<T: 'static, const N: usize> TypedPool<T, N> {
    /// Rejects zero-capacity pools at compile time.
    const NON_EMPTY: () = assert!(N > 0, "typed pool capacity must be greater than zero");

    /// Allocates uninitialized memory for one `T`.
    #[must_use]
    pub fn allocate() -> Option<NonNull<T>> {
        let () = Self::NON_EMPTY;
        pool_registry().allocate::<T>(N)
    }

    /// Returns memory obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `TypedPool::<T, N>::allocate` and its value must
    /// already be dropped.
    pub unsafe fn delete(ptr: NonNull<T>) {
        // SAFETY: forwarded caller contract.
        unsafe { pool_registry().deallocate::<T>(N, ptr) };
    }

    /// Allocates memory of `layout` on behalf of `T`, falling back to the
    /// general allocator when the size does not match `T`.
    #[must_use]
    pub fn allocate_layout(layout: Layout) -> Option<NonNull<u8>> {
        let () = Self::NON_EMPTY;
        pool_registry().allocate_layout::<T>(N, layout)
    }

    /// Returns memory obtained from [`allocate_layout`](Self::allocate_layout).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_layout(layout)` with the same layout.
    pub unsafe fn deallocate_layout(ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { pool_registry().deallocate_layout::<T>(N, ptr, layout) };
    }

    /// Returns the counters of this pool, if it has been created.
    #[must_use]
    pub fn stats() -> Option<PoolStats> {
        pool_registry().stats::<T>(N)
    }
}
