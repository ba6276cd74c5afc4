//! # Object Header
//!
//! The intrusive reference count every managed object carries, and the
//! deletion hook that runs when the count drops to zero.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

/// Ownership contract: add a reference, release a reference, read the count.
///
/// Implemented for every [`ManagedObject`](super::ManagedObject).
pub trait RefCounted {
    /// Adds one reference.
    fn add_ref(&self);

    /// Releases one reference. When the count drops to zero or below, the
    /// object's deletion hook runs and the object must not be touched again.
    ///
    /// # Safety
    ///
    /// `this` must point to a live object holding a reference owned by the
    /// caller. Releasing more references than were added is a double free.
    unsafe fn release_ref(this: NonNull<Self>);

    /// Returns the current reference count.
    fn ref_count(&self) -> i32;
}

/// Destroys an object and returns its storage.
#[derive(Clone, Copy)]
pub struct Deleter {
    /// Start of the outermost object the header belongs to.
    owner: NonNull<u8>,
    /// Drops the value at `owner` and frees its memory.
    drop_fn: unsafe fn(NonNull<u8>),
}

impl Deleter {
    /// Creates a deletion hook that calls `drop_fn(owner)`.
    ///
    /// # Safety
    ///
    /// `drop_fn(owner)` must be sound to call exactly once, when the last
    /// reference to the object goes away.
    #[must_use]
    pub const unsafe fn new(owner: NonNull<u8>, drop_fn: unsafe fn(NonNull<u8>)) -> Self {
        Self { owner, drop_fn }
    }
}

impl fmt::Debug for Deleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deleter").field("owner", &self.owner).finish_non_exhaustive()
    }
}

/// Reference count plus deletion hook, embedded in the root of every managed
/// object.
///
/// The count is not atomic: managed objects belong to one thread.
#[derive(Default)]
pub struct ObjectHeader {
    /// Outstanding references.
    count: Cell<i32>,
    /// Runs when the count reaches zero. Unset for objects whose storage the
    /// runtime does not own.
    deleter: Cell<Option<Deleter>>,
}

impl ObjectHeader {
    /// Creates a header with no references.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_count(0)
    }

    /// Creates a header starting at `count` references.
    #[must_use]
    pub const fn with_count(count: i32) -> Self {
        Self {
            count: Cell::new(count),
            deleter: Cell::new(None),
        }
    }

    /// Adds one reference.
    #[inline]
    pub fn add_ref(&self) {
        self.count.set(self.count.get().wrapping_add(1));
    }

    /// Returns the current reference count.
    #[inline]
    #[must_use]
    pub fn ref_count(&self) -> i32 {
        self.count.get()
    }

    /// Checks whether a deletion hook is installed.
    #[must_use]
    pub fn has_deleter(&self) -> bool {
        self.deleter.get().is_some()
    }

    /// Installs the hook that destroys the object at zero references.
    ///
    /// # Safety
    ///
    /// The hook must destroy the object this header is embedded in.
    pub unsafe fn install_deleter(&self, deleter: Deleter) {
        debug_assert!(!self.has_deleter(), "deletion hook installed twice");
        self.deleter.set(Some(deleter));
    }

    /// Takes ownership of a freshly allocated object: installs its hook and
    /// sets the count to exactly one.
    ///
    /// # Safety
    ///
    /// Same as [`install_deleter`](Self::install_deleter).
    pub(crate) unsafe fn claim(&self, deleter: Deleter) {
        // SAFETY: forwarded caller contract.
        unsafe { self.install_deleter(deleter) };
        self.count.set(1);
    }

    /// Releases one reference and runs the deletion hook on the transition to
    /// zero or below.
    ///
    /// The hook is taken before it runs, so it runs at most once.
    ///
    /// # Safety
    ///
    /// `this` must point to a live header. If the hook runs, the header and
    /// the object around it are gone when this returns.
    pub unsafe fn release(this: NonNull<Self>) {
        // SAFETY: the caller guarantees the header is live.
        let header = unsafe { this.as_ref() };
        let count = header.count.get().wrapping_sub(1);
        header.count.set(count);
        if count > 0 {
            return;
        }

        match header.deleter.take() {
            // SAFETY: the hook was installed for the object around this header.
            Some(deleter) => unsafe { (deleter.drop_fn)(deleter.owner) },
            None => tracing::warn!("managed object reached zero references without a deletion hook"),
        }
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("count", &self.count.get())
            .field("owned", &self.has_deleter())
            .finish()
    }
}
