//! # Canonical Strings
//!
//! Interning maps string content to one canonical, immutable instance.
//! Resource names and interface tags are interned once and compared by
//! address everywhere else.

mod interner;
mod unique;

pub use interner::{find, hash_and_len, intern, interner, StringInterner};
pub use unique::UniqueStr;
