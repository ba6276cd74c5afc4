//! # NAGA Core Runtime
//!
//! The object runtime underneath a 2D game engine:
//! - Fixed-size block pools with per-type registries
//! - Intrusive reference counting with owning handles
//! - Interface tags instead of compiler type information
//! - Lazy singletons and a canonical string interner
//!
//! ## Architecture Rules
//!
//! 1. **Objects come from pools** - one block allocation serves many objects
//! 2. **Strings are interned once** - comparisons are pointer comparisons
//! 3. **Ownership is explicit** - every reference is added and released by a handle
//!
//! ## Example
//!
//! ```rust,ignore
//! use naga_core::{intern, managed_object, Handle, Object, UniqueStr};
//!
//! struct Sprite { base: Object, texture: UniqueStr<'static> }
//! managed_object!(Sprite, base = base: Object, tag = "game.Sprite");
//!
//! let sprite = Handle::new_pooled::<64>(Sprite {
//!     base: Object::new(),
//!     texture: intern("bird/bird_hero.png"),
//! }).ok().expect("out of memory");
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;
pub mod object;
pub mod runtime;
pub mod singleton;
pub mod strings;

pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use memory::{pool_registry, BlockPool, ItemPool, PoolRegistry, PoolStats, TypedPool};
pub use object::{
    cast_interface, is_tagged, is_type, tag_for, BitStatus, CountedInstance, Handle,
    InstanceCounter, Interface, InterfaceId, ManagedObject, Object, ObjectHeader, RefCounted,
};
pub use runtime::Runtime;
pub use singleton::Singleton;
pub use strings::{find, intern, interner, StringInterner, UniqueStr};
