//! # Interfaces
//!
//! Runtime capability queries without language-level type information.
//!
//! Every managed type is identified by an [`InterfaceId`], an interned tag
//! string. A derived type embeds its base as a field; asking an object for an
//! interface answers with the object itself when the tag is its own and
//! otherwise forwards the question to the embedded base. The walk ends at the
//! root [`Object`], which answers only for `"naga.Object"`.
//!
//! ```rust,ignore
//! struct Sprite { base: Object, frame: u32 }
//! managed_object!(Sprite, base = base: Object, tag = "game.Sprite");
//!
//! struct Hero { sprite: Sprite, lives: u8 }
//! managed_object!(Hero, base = sprite: Sprite, tag = "game.Hero");
//!
//! let hero = Handle::new(Hero { sprite: Sprite { base: Object::new(), frame: 0 }, lives: 3 });
//! let sprite: Handle<Sprite> = hero.cast::<Sprite>().unwrap(); // shares the count
//! assert!(hero.is_type::<Object>());
//! ```

#![allow(unsafe_code)]

use std::any::Any;
use std::fmt;
use std::ptr::NonNull;
use std::sync::OnceLock;

use super::header::{ObjectHeader, RefCounted};
use crate::strings::{intern, UniqueStr};

/// Tag identifying one managed type.
///
/// Backed by an interned string, so comparing two ids is a pointer
/// comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(UniqueStr<'static>);

impl InterfaceId {
    /// Returns the id for `tag`, interning it in the process-wide interner.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self(intern(tag))
    }

    /// Returns the interned tag.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> UniqueStr<'static> {
        self.0
    }

    /// Returns the tag text.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0.as_str()
    }
}

impl fmt::Debug for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceId({:?})", self.as_str())
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that carries an intrusive reference count and answers interface
/// queries.
///
/// Implement it with [`managed_object!`](crate::managed_object) rather than
/// by hand.
///
/// # Safety
///
/// Handles free objects through what these methods return, so an
/// implementation must uphold:
///
/// - `header` returns the header of the innermost base embedded in `self`,
///   never one belonging to another object.
/// - Every part `get_interface` returns lives inside `self` and answers
///   `header` with that same header.
pub unsafe trait ManagedObject: 'static {
    /// The header shared by this object and every base it embeds.
    fn header(&self) -> &ObjectHeader;

    /// Returns the part of this object that implements `id`, searching the
    /// object's own type first and then its bases, innermost last.
    fn get_interface(&self, id: InterfaceId) -> Option<&dyn Any>;

    /// Tag of the most derived type.
    fn class_id(&self) -> InterfaceId;
}

/// A concrete managed type with a tag of its own.
pub trait Interface: ManagedObject + Sized {
    /// The tag of this type. Resolved once and cached.
    fn interface_id() -> InterfaceId;
}

impl<T: ManagedObject + ?Sized> RefCounted for T {
    #[inline]
    fn add_ref(&self) {
        self.header().add_ref();
    }

    unsafe fn release_ref(this: NonNull<Self>) {
        // SAFETY: the caller guarantees the object is live.
        let header = NonNull::from(unsafe { this.as_ref() }.header());
        // SAFETY: the header lives as long as the object around it.
        unsafe { ObjectHeader::release(header) };
    }

    #[inline]
    fn ref_count(&self) -> i32 {
        self.header().ref_count()
    }
}

/// Tag of the managed type `U`.
#[must_use]
pub fn tag_for<U: Interface>() -> InterfaceId {
    U::interface_id()
}

/// Returns the part of `object` that is a `U`, if it has one.
///
/// This is the checked downcast of the object model: it succeeds for the
/// object's own type and every base it embeds.
#[must_use]
pub fn cast_interface<U: Interface, S: ManagedObject + ?Sized>(object: &S) -> Option<&U> {
    object.get_interface(U::interface_id())?.downcast_ref::<U>()
}

/// Checks whether `object` implements `U`.
#[must_use]
pub fn is_type<U: Interface, S: ManagedObject + ?Sized>(object: &S) -> bool {
    object.get_interface(U::interface_id()).is_some()
}

/// Checks whether `object` implements the interface tagged `id`.
///
/// An absent object implements nothing.
#[must_use]
pub fn is_tagged<S: ManagedObject + ?Sized>(id: InterfaceId, object: Option<&S>) -> bool {
    object.is_some_and(|object| object.get_interface(id).is_some())
}

/// Implements [`ManagedObject`] and [`Interface`] for a type that embeds a
/// managed base.
///
/// `$field` is the embedded base, `$base` its type, `$tag` the type's tag.
/// The reference count lives in the innermost base; the generated `header`
/// forwards to it.
///
/// # Example
///
/// ```rust,ignore
/// struct Sprite { base: Object, frame: u32 }
/// managed_object!(Sprite, base = base: Object, tag = "game.Sprite");
/// ```
#[macro_export]
macro_rules! managed_object {
    ($ty:ty, base = $field:ident : $base:ty, tag = $tag:expr) => {
        // SAFETY: the header and every interface part come from `self` or
        // its embedded base, which share the innermost header.
        #[allow(unsafe_code)]
        unsafe impl $crate::object::ManagedObject for $ty {
            #[inline]
            fn header(&self) -> &$crate::object::ObjectHeader {
                let base: &$base = &self.$field;
                $crate::object::ManagedObject::header(base)
            }

            fn get_interface(
                &self,
                id: $crate::object::InterfaceId,
            ) -> ::core::option::Option<&dyn ::core::any::Any> {
                if id == <Self as $crate::object::Interface>::interface_id() {
                    return ::core::option::Option::Some(self as &dyn ::core::any::Any);
                }
                let base: &$base = &self.$field;
                $crate::object::ManagedObject::get_interface(base, id)
            }

            fn class_id(&self) -> $crate::object::InterfaceId {
                <Self as $crate::object::Interface>::interface_id()
            }
        }

        impl $crate::object::Interface for $ty {
            fn interface_id() -> $crate::object::InterfaceId {
                static ID: ::std::sync::OnceLock<$crate::object::InterfaceId> =
                    ::std::sync::OnceLock::new();
                *ID.get_or_init(|| $crate::object::InterfaceId::new($tag))
            }
        }
    };
}

/// Root of every managed type: a header and nothing else.
///
/// Embed it as the innermost base of a managed type.
#[derive(Debug, Default)]
pub struct Object {
    header: ObjectHeader,
}

impl Object {
    /// Tag of the root type.
    pub const TAG: &'static str = "naga.Object";

    /// Creates a root with no references.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            header: ObjectHeader::new(),
        }
    }

    /// Creates a root starting at `count` references.
    #[must_use]
    pub const fn with_count(count: i32) -> Self {
        Self {
            header: ObjectHeader::with_count(count),
        }
    }
}

// SAFETY: the root owns its header and answers only with itself.
unsafe impl ManagedObject for Object {
    #[inline]
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn get_interface(&self, id: InterfaceId) -> Option<&dyn Any> {
        (id == Self::interface_id()).then_some(self as &dyn Any)
    }

    fn class_id(&self) -> InterfaceId {
        Self::interface_id()
    }
}

impl Interface for Object {
    fn interface_id() -> InterfaceId {
        static ID: OnceLock<InterfaceId> = OnceLock::new();
        *ID.get_or_init(|| InterfaceId::new(Object::TAG))
    }
}
