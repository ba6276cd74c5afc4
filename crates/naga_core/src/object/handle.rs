//! # Owning Handles
//!
//! [`Handle`] is a smart pointer over an intrusively counted object. Cloning
//! adds a reference, dropping releases one, and the object destroys itself
//! through its deletion hook when the last reference goes.
//!
//! How references are added and released is a [`PointerTraits`] policy. The
//! default, [`IntrusiveTraits`], forwards to the object's own count.
//!
//! ## Reference Accounting
//!
//! | Operation                    | Count change                       |
//! |------------------------------|------------------------------------|
//! | [`Handle::new`]              | object created at exactly 1        |
//! | [`Handle::from_raw`]         | +1 (a new reference)               |
//! | [`Handle::adopt`]            | 0 (takes over an existing one)     |
//! | `clone`                      | +1                                 |
//! | `drop`                       | -1                                 |
//! | [`Handle::set`]              | +1 new, then -1 old                |
//! | [`Handle::take`]             | 0 (moves the reference out)        |
//! | [`Handle::into_raw`]         | 0 (the caller owns the reference)  |

#![allow(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use super::header::{Deleter, RefCounted};
use super::interface::{cast_interface, Interface, ManagedObject};
use crate::memory::TypedPool;

/// How a handle adds and releases references on its target.
pub trait PointerTraits<T: ?Sized> {
    /// Adds one reference to `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object.
    unsafe fn add_ref(ptr: NonNull<T>);

    /// Releases one reference to `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object and the caller must own the released
    /// reference.
    unsafe fn release(ptr: NonNull<T>);
}

/// Forwards to the object's own reference count.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrusiveTraits;

impl<T: RefCounted + ?Sized> PointerTraits<T> for IntrusiveTraits {
    #[inline]
    unsafe fn add_ref(ptr: NonNull<T>) {
        // SAFETY: the caller guarantees the object is live.
        unsafe { ptr.as_ref() }.add_ref();
    }

    #[inline]
    unsafe fn release(ptr: NonNull<T>) {
        // SAFETY: forwarded caller contract.
        unsafe { T::release_ref(ptr) };
    }
}

/// Smart pointer holding one reference to a counted object, or nothing.
///
/// # Thread Safety
///
/// Counts are not atomic, so handles are neither `Send` nor `Sync`.
///
/// # Example
///
/// ```rust,ignore
/// let hero = Handle::new(Hero::default());   // count 1
/// let other = hero.clone();                  // count 2
/// drop(hero);                                // count 1
/// drop(other);                               // deleted
/// ```
pub struct Handle<T: ?Sized, S: PointerTraits<T> = IntrusiveTraits> {
    /// The target, if any. Raw pointers keep the handle `!Send + !Sync`.
    ptr: Option<NonNull<T>>,
    _owns: PhantomData<T>,
    _traits: PhantomData<fn() -> S>,
}

impl<T: ?Sized, S: PointerTraits<T>> Handle<T, S> {
    /// An empty handle.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _owns: PhantomData,
            _traits: PhantomData,
        }
    }

    /// Wraps `ptr`, adding a new reference. A null pointer gives an empty
    /// handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        let ptr = NonNull::new(ptr);
        if let Some(ptr) = ptr {
            // SAFETY: the caller guarantees the object is live.
            unsafe { S::add_ref(ptr) };
        }
        Self {
            ptr,
            _owns: PhantomData,
            _traits: PhantomData,
        }
    }

    /// Wraps `ptr`, taking over a reference the caller already owns.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object, and the caller must own
    /// one reference to it, which passes to the handle.
    #[must_use]
    pub unsafe fn adopt(ptr: *mut T) -> Self {
        Self {
            ptr: NonNull::new(ptr),
            _owns: PhantomData,
            _traits: PhantomData,
        }
    }

    /// Releases the current target and takes over the caller's reference to
    /// `ptr`.
    ///
    /// # Safety
    ///
    /// Same as [`adopt`](Self::adopt).
    pub unsafe fn attach(&mut self, ptr: *mut T) {
        // SAFETY: forwarded caller contract.
        let adopted = unsafe { Self::adopt(ptr) };
        *self = adopted;
    }

    /// Points the handle at `ptr`, adding a reference to it and releasing the
    /// previous target. Pointing at the current target changes nothing.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw`](Self::from_raw).
    pub unsafe fn set(&mut self, ptr: *mut T) {
        if self.addr() == ptr.cast::<()>() as usize {
            return;
        }
        // SAFETY: forwarded caller contract. The new reference is added
        // before the old one is released.
        let replacement = unsafe { Self::from_raw(ptr) };
        *self = replacement;
    }

    /// Moves the reference out, leaving this handle empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Releases the target and empties the handle.
    pub fn clear(&mut self) {
        drop(self.take());
    }

    /// Empties the handle without releasing, handing the reference to the
    /// caller.
    #[must_use = "the detached reference leaks unless it is released"]
    pub fn detach(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Consumes the handle without releasing, handing the reference to the
    /// caller.
    #[must_use = "the detached reference leaks unless it is released"]
    pub fn into_raw(self) -> Option<NonNull<T>> {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }

    /// Returns the target pointer without touching the count.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Returns the target, if any.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: the handle keeps its target alive.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Checks whether the handle is empty.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Checks whether the handle points at `object`.
    #[must_use]
    pub fn is(&self, object: &T) -> bool {
        self.addr() == (object as *const T).cast::<()>() as usize
    }

    /// Swaps targets with `other`. No counts change.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Target address, zero when empty.
    fn addr(&self) -> usize {
        self.ptr.map_or(0, |ptr| ptr.cast::<()>().as_ptr() as usize)
    }
}

impl<T: RefCounted + ?Sized, S: PointerTraits<T>> Handle<T, S> {
    /// Current reference count of the target; zero when empty.
    #[must_use]
    pub fn ref_count(&self) -> i32 {
        self.get().map_or(0, RefCounted::ref_count)
    }
}

impl<T: ManagedObject> Handle<T> {
    /// Moves `value` to the heap and returns the only reference to it.
    ///
    /// Whatever count `value` carried, the new object starts at exactly one.
    #[must_use]
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: `ptr` is a live allocation and `drop_boxed::<T>` frees
        // exactly that allocation.
        unsafe {
            ptr.as_ref()
                .header()
                .claim(Deleter::new(ptr.cast(), drop_boxed::<T>));
            Self::adopt(ptr.as_ptr())
        }
    }

    /// Moves `value` into the process-wide pool for `T` with `N` cells per
    /// block and returns the only reference to it.
    ///
    /// # Errors
    ///
    /// Gives `value` back if no memory could be obtained.
    pub fn new_pooled<const N: usize>(value: T) -> Result<Self, T> {
        let Some(cell) = TypedPool::<T, N>::allocate() else {
            return Err(value);
        };
        // SAFETY: `cell` is uninitialized memory for one `T`, and
        // `drop_pooled::<T, N>` returns it to the same pool.
        unsafe {
            cell.as_ptr().write(value);
            cell.as_ref()
                .header()
                .claim(Deleter::new(cell.cast(), drop_pooled::<T, N>));
            Ok(Self::adopt(cell.as_ptr()))
        }
    }

    /// Erases the concrete type.
    #[must_use]
    pub fn into_object(self) -> Handle<dyn ManagedObject> {
        let ptr = self.into_raw().map(|ptr| {
            let erased: NonNull<dyn ManagedObject> = ptr;
            erased
        });
        Handle {
            ptr,
            _owns: PhantomData,
            _traits: PhantomData,
        }
    }
}

impl<T: ManagedObject + ?Sized> Handle<T> {
    /// Returns a handle to the `U` part of the target, sharing its count.
    ///
    /// # Returns
    ///
    /// `None` if the handle is empty, the target does not implement `U`, or
    /// the `U` part does not share the target's header.
    #[must_use]
    pub fn cast<U: Interface>(&self) -> Option<Handle<U>> {
        let target = self.get()?;
        let part = cast_interface::<U, T>(target)?;
        if !ptr::eq(part.header(), target.header()) {
            let interface = U::interface_id();
            tracing::warn!(%interface, "interface part does not share the object's header");
            return None;
        }
        // SAFETY: `part` lives inside the target, which this handle keeps
        // alive; the new handle adds its own reference on the shared header.
        Some(unsafe { Handle::from_raw(NonNull::from(part).as_ptr()) })
    }

    /// Checks whether the target implements `U`.
    #[must_use]
    pub fn is_type<U: Interface>(&self) -> bool {
        self.get().is_some_and(super::interface::is_type::<U, T>)
    }
}

/// Deletion hook of boxed objects.
unsafe fn drop_boxed<T>(owner: NonNull<u8>) {
    // SAFETY: `owner` came from `Box::leak` in `Handle::new`.
    drop(unsafe { Box::from_raw(owner.cast::<T>().as_ptr()) });
}

/// Deletion hook of pooled objects.
unsafe fn drop_pooled<T: 'static, const N: usize>(owner: NonNull<u8>) {
    let ptr = owner.cast::<T>();
    // SAFETY: `owner` came from `TypedPool::<T, N>::allocate` in
    // `Handle::new_pooled` and holds a live `T`.
    unsafe {
        ptr.as_ptr().drop_in_place();
        TypedPool::<T, N>::delete(ptr);
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Clone for Handle<T, S> {
    fn clone(&self) -> Self {
        if let Some(ptr) = self.ptr {
            // SAFETY: the handle keeps its target alive.
            unsafe { S::add_ref(ptr) };
        }
        Self {
            ptr: self.ptr,
            _owns: PhantomData,
            _traits: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.addr() != source.addr() {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Drop for Handle<T, S> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: the handle owns one reference to a live target.
            unsafe { S::release(ptr) };
        }
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Default for Handle<T, S> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Deref for Handle<T, S> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty.
    fn deref(&self) -> &T {
        match self.get() {
            Some(target) => target,
            None => panic!("dereferenced an empty handle"),
        }
    }
}

impl<T: ?Sized, S: PointerTraits<T>> PartialEq for Handle<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Eq for Handle<T, S> {}

impl<T: ?Sized, S: PointerTraits<T>> PartialOrd for Handle<T, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Ord for Handle<T, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T: ?Sized, S: PointerTraits<T>> Hash for Handle<T, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized, S: PointerTraits<T>> fmt::Debug for Handle<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => write!(f, "Handle({:p})", ptr.cast::<()>()),
            None => f.write_str("Handle(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed_object;
    use crate::object::{InterfaceId, Object, ObjectHeader};
    use std::any::Any;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Records its own destruction.
    struct Probe {
        base: Object,
        dropped: Rc<Cell<u32>>,
    }
    managed_object!(Probe, base = base: Object, tag = "test.handle.Probe");

    impl Drop for Probe {
        fn drop(&mut self) {
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    struct Mount {
        probe: Probe,
        label: &'static str,
    }
    managed_object!(Mount, base = probe: Probe, tag = "test.handle.Mount");

    struct Loose {
        base: Object,
    }
    managed_object!(Loose, base = base: Object, tag = "test.handle.Loose");

    fn probe() -> (Probe, Rc<Cell<u32>>) {
        let dropped = Rc::new(Cell::new(0));
        let probe = Probe {
            base: Object::new(),
            dropped: Rc::clone(&dropped),
        };
        (probe, dropped)
    }

    #[test]
    fn test_new_starts_at_one() {
        let (value, dropped) = probe();
        let handle = Handle::new(value);
        assert_eq!(handle.ref_count(), 1);
        drop(handle);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_new_resets_preexisting_count() {
        let dropped = Rc::new(Cell::new(0));
        let handle = Handle::new(Probe {
            base: Object::with_count(7),
            dropped: Rc::clone(&dropped),
        });
        assert_eq!(handle.ref_count(), 1);
        drop(handle);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_copy_assign_drop_sequence() {
        let (value, dropped) = probe();
        let first = Handle::new(value);
        let second = first.clone();
        assert_eq!(first.ref_count(), 2);

        let mut third = Handle::<Probe>::null();
        third.clone_from(&second);
        assert_eq!(first.ref_count(), 3);

        third.clone_from(&first);
        assert_eq!(first.ref_count(), 3);

        drop(first);
        drop(third);
        assert_eq!(second.ref_count(), 1);
        assert_eq!(dropped.get(), 0);

        drop(second);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_take_leaves_source_empty() {
        let (value, dropped) = probe();
        let mut source = Handle::new(value);
        let moved = source.take();

        assert!(source.is_null());
        assert_eq!(moved.ref_count(), 1);
        drop(source);
        assert_eq!(dropped.get(), 0);
        drop(moved);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_from_raw_adds_and_adopt_does_not() {
        let (value, dropped) = probe();
        let owner = Handle::new(value);
        let raw = owner.as_ptr().unwrap().as_ptr();

        let shared = unsafe { Handle::<Probe>::from_raw(raw) };
        assert_eq!(owner.ref_count(), 2);

        let detached = shared.into_raw().unwrap();
        assert_eq!(owner.ref_count(), 2);

        let adopted = unsafe { Handle::<Probe>::adopt(detached.as_ptr()) };
        assert_eq!(owner.ref_count(), 2);

        drop(adopted);
        drop(owner);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_attach_releases_previous() {
        let (a, dropped_a) = probe();
        let (b, dropped_b) = probe();
        let mut handle = Handle::new(a);
        let other = Handle::new(b);
        let raw = other.into_raw().unwrap();

        unsafe { handle.attach(raw.as_ptr()) };
        assert_eq!(dropped_a.get(), 1);
        assert_eq!(handle.ref_count(), 1);
        drop(handle);
        assert_eq!(dropped_b.get(), 1);
    }

    #[test]
    fn test_set_same_pointer_is_noop() {
        let (value, dropped) = probe();
        let mut handle = Handle::new(value);
        let raw = handle.as_ptr().unwrap().as_ptr();

        unsafe { handle.set(raw) };
        assert_eq!(handle.ref_count(), 1);
        assert_eq!(dropped.get(), 0);

        unsafe { handle.set(std::ptr::null_mut()) };
        assert!(handle.is_null());
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_detach_and_clear() {
        let (value, dropped) = probe();
        let mut handle = Handle::new(value);
        let raw = handle.detach().unwrap();
        assert!(handle.is_null());
        assert_eq!(dropped.get(), 0);

        let mut readopted = unsafe { Handle::<Probe>::adopt(raw.as_ptr()) };
        readopted.clear();
        assert!(readopted.is_null());
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_null_handles() {
        let empty = Handle::<Probe>::default();
        assert!(empty.is_null());
        assert!(empty.get().is_none());
        assert_eq!(empty.ref_count(), 0);
        assert_eq!(empty, Handle::null());
        assert!(empty.cast::<Object>().is_none());
        assert_eq!(format!("{empty:?}"), "Handle(null)");
    }

    #[test]
    #[should_panic(expected = "empty handle")]
    fn test_deref_null_panics() {
        let empty = Handle::<Probe>::null();
        let _ = empty.dropped.get();
    }

    #[test]
    fn test_equality_and_hash_by_address() {
        let (a, _) = probe();
        let (b, _) = probe();
        let a = Handle::new(a);
        let b = Handle::new(b);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.is(&a));
        assert!(!a.is(&b));
        assert_eq!(a < b, a.as_ptr().unwrap().as_ptr() < b.as_ptr().unwrap().as_ptr());

        let set: HashSet<Handle<Probe>> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_swap_keeps_counts() {
        let (a, _) = probe();
        let (b, _) = probe();
        let mut a = Handle::new(a);
        let mut b = Handle::new(b);
        let a_addr = a.as_ptr();
        a.swap(&mut b);
        assert_eq!(b.as_ptr(), a_addr);
        assert_eq!(a.ref_count(), 1);
        assert_eq!(b.ref_count(), 1);
    }

    #[test]
    fn test_cast_shares_count_and_deletes_once() {
        let (value, dropped) = probe();
        let mount = Handle::new(Mount {
            probe: value,
            label: "saddle",
        });

        let as_probe = mount.cast::<Probe>().unwrap();
        let as_root = mount.cast::<Object>().unwrap();
        assert_eq!(mount.ref_count(), 3);
        assert!(as_probe.is(&mount.probe));
        assert!(mount.cast::<Loose>().is_none());
        assert!(mount.is_type::<Probe>());
        assert_eq!(mount.label, "saddle");

        drop(mount);
        drop(as_root);
        assert_eq!(dropped.get(), 0);
        drop(as_probe);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_type_erased_handles() {
        let (value, dropped) = probe();
        let erased = Handle::new(value).into_object();
        assert_eq!(erased.ref_count(), 1);
        assert_eq!(erased.class_id(), Probe::interface_id());

        let back = erased.cast::<Probe>().unwrap();
        assert_eq!(back.ref_count(), 2);
        drop(erased);
        drop(back);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn test_pooled_objects_recycle_cells() {
        let (value, dropped) = probe();
        let first = Handle::new_pooled::<4>(value).ok().unwrap();
        let cell = first.as_ptr().unwrap();
        assert_eq!(first.ref_count(), 1);

        let live = TypedPool::<Probe, 4>::stats().unwrap().live;
        drop(first);
        assert_eq!(dropped.get(), 1);
        assert_eq!(TypedPool::<Probe, 4>::stats().unwrap().live, live - 1);

        let (value, _) = probe();
        let second = Handle::new_pooled::<4>(value).ok().unwrap();
        assert_eq!(second.as_ptr(), Some(cell));
    }

    #[test]
    fn test_objects_owning_handles_release_recursively() {
        struct Node {
            base: Object,
            next: Handle<Node>,
            dropped: Rc<Cell<u32>>,
        }
        managed_object!(Node, base = base: Object, tag = "test.handle.Node");

        impl Drop for Node {
            fn drop(&mut self) {
                self.dropped.set(self.dropped.get() + 1);
            }
        }

        let dropped = Rc::new(Cell::new(0));
        let tail = Handle::new(Node {
            base: Object::new(),
            next: Handle::null(),
            dropped: Rc::clone(&dropped),
        });
        let head = Handle::new_pooled::<8>(Node {
            base: Object::new(),
            next: tail,
            dropped: Rc::clone(&dropped),
        })
        .ok()
        .unwrap();

        assert_eq!(head.next.ref_count(), 1);
        drop(head);
        assert_eq!(dropped.get(), 2);
    }

    /// Answers for `Loose` with a part that keeps a header of its own.
    struct Split {
        base: Object,
        loose: Loose,
    }

    // SAFETY: deliberately breaks the shared-header rule for `Loose`; `cast`
    // must refuse that part.
    unsafe impl ManagedObject for Split {
        fn header(&self) -> &ObjectHeader {
            self.base.header()
        }

        fn get_interface(&self, id: InterfaceId) -> Option<&dyn Any> {
            if id == Loose::interface_id() {
                return Some(&self.loose as &dyn Any);
            }
            self.base.get_interface(id)
        }

        fn class_id(&self) -> InterfaceId {
            self.base.class_id()
        }
    }

    #[test]
    fn test_cast_refuses_part_with_foreign_header() {
        let split = Handle::new(Split {
            base: Object::new(),
            loose: Loose { base: Object::new() },
        });
        assert!(split.is_type::<Loose>());

        assert!(split.cast::<Loose>().is_none());
        assert_eq!(split.ref_count(), 1);
        assert_eq!(split.loose.ref_count(), 0);

        let root = split.cast::<Object>().unwrap();
        assert_eq!(split.ref_count(), 2);
        drop(split);
        assert_eq!(root.ref_count(), 1);
    }

    thread_local! {
        static ADDS: Cell<u32> = const { Cell::new(0) };
        static RELEASES: Cell<u32> = const { Cell::new(0) };
    }

    /// Intrusive counting that also tallies the traffic per thread.
    struct TallyTraits;

    impl<T: RefCounted + ?Sized> PointerTraits<T> for TallyTraits {
        unsafe fn add_ref(ptr: NonNull<T>) {
            ADDS.with(|adds| adds.set(adds.get() + 1));
            unsafe { <IntrusiveTraits as PointerTraits<T>>::add_ref(ptr) };
        }

        unsafe fn release(ptr: NonNull<T>) {
            RELEASES.with(|releases| releases.set(releases.get() + 1));
            unsafe { <IntrusiveTraits as PointerTraits<T>>::release(ptr) };
        }
    }

    fn tally() -> (u32, u32) {
        (ADDS.with(Cell::get), RELEASES.with(Cell::get))
    }

    #[test]
    fn test_custom_policy_sees_every_add_and_release() {
        let (value, dropped) = probe();
        let raw = Handle::new(value).into_raw().unwrap();
        let before = tally();

        let first = unsafe { Handle::<Probe, TallyTraits>::adopt(raw.as_ptr()) };
        let second = first.clone();
        let third = unsafe { Handle::<Probe, TallyTraits>::from_raw(raw.as_ptr()) };
        assert_eq!(first.ref_count(), 3);
        assert_eq!(tally(), (before.0 + 2, before.1));

        let mut fourth = Handle::<Probe, TallyTraits>::null();
        fourth.clone_from(&third);
        fourth.clone_from(&first);
        assert_eq!(tally(), (before.0 + 3, before.1));

        drop(first);
        drop(second);
        drop(third);
        assert_eq!(dropped.get(), 0);
        drop(fourth);
        assert_eq!(dropped.get(), 1);
        assert_eq!(tally(), (before.0 + 3, before.1 + 4));
    }
}
