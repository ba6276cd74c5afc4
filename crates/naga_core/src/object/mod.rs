//! # Object Model
//!
//! Intrusively counted objects, owning handles, and interface queries.
//!
//! ## Design
//!
//! - The count lives in an [`ObjectHeader`] inside the innermost base
//!   ([`Object`]); derived types embed their base and share its header.
//! - Objects are created through [`Handle::new`] or [`Handle::new_pooled`],
//!   which install the deletion hook and hand out the first reference.
//! - A type's capabilities are discovered with tag strings
//!   ([`InterfaceId`]) rather than compiler type information.

mod counter;
mod handle;
mod header;
mod interface;
mod status;

pub use counter::{CountedInstance, InstanceCounter};
pub use handle::{Handle, IntrusiveTraits, PointerTraits};
pub use header::{Deleter, ObjectHeader, RefCounted};
pub use interface::{
    cast_interface, is_tagged, is_type, tag_for, Interface, InterfaceId, ManagedObject, Object,
};
pub use status::BitStatus;
