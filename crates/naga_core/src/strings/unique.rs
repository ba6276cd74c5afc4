//! # Unique Strings
//!
//! Canonical, immutable strings. Exactly one [`UniqueStr`] exists per distinct
//! content within an interner, so equality is a pointer comparison.

#![allow(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// Storage record of one interned string.
///
/// Points into the owning interner's arena and is freed with it.
#[derive(Debug)]
pub(crate) struct Entry {
    /// Content followed by the NUL terminator, as stored in the arena.
    with_nul: NonNull<[u8]>,
    /// Rolling hash of the content.
    hash: u32,
}

// SAFETY: the bytes are written once before the entry is published and are
// read-only afterwards.
unsafe impl Send for Entry {}
// SAFETY: as above.
unsafe impl Sync for Entry {}

impl Entry {
    /// Records `with_nul`, which must hold UTF-8 content plus a NUL.
    ///
    /// # Safety
    ///
    /// `with_nul` must stay valid and unchanged for as long as the entry is
    /// reachable.
    pub(crate) const unsafe fn new(with_nul: NonNull<[u8]>, hash: u32) -> Self {
        Self { with_nul, hash }
    }

    pub(crate) const fn hash(&self) -> u32 {
        self.hash
    }

    pub(crate) const fn bytes_with_nul(&self) -> &[u8] {
        // SAFETY: guaranteed by the contract of `Entry::new`.
        unsafe { self.with_nul.as_ref() }
    }

    pub(crate) const fn as_str(&self) -> &str {
        let with_nul = self.bytes_with_nul();
        let (text, _) = with_nul.split_at(with_nul.len() - 1);
        // SAFETY: the content was copied from a `&str`.
        unsafe { std::str::from_utf8_unchecked(text) }
    }
}

/// Handle to a canonical interned string.
///
/// Copying a handle is free. Two handles from the same interner are equal
/// exactly when they are the same instance, which is exactly when their
/// contents are equal. A handle borrows its interner; handles from the
/// process-wide interner are `UniqueStr<'static>`.
#[derive(Clone, Copy)]
pub struct UniqueStr<'a>(&'a Entry);

impl<'a> UniqueStr<'a> {
    pub(crate) const fn from_entry(entry: &'a Entry) -> Self {
        Self(entry)
    }

    /// Returns the content.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'a str {
        self.0.as_str()
    }

    /// Returns the length in bytes, terminator excluded.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.with_nul.len() - 1
    }

    /// Checks whether the string is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Returns the cached rolling hash of the content.
    ///
    /// This is the string's `hash()`; the name keeps it apart from
    /// [`Hash::hash`], which hashes the instance address.
    #[inline]
    #[must_use]
    pub const fn hash_code(self) -> u32 {
        self.0.hash
    }

    /// Returns the stored bytes including the NUL terminator.
    #[inline]
    #[must_use]
    pub const fn as_bytes_with_nul(self) -> &'a [u8] {
        self.0.bytes_with_nul()
    }

    /// Bytes this string occupies in the interner's buffers.
    #[inline]
    #[must_use]
    pub const fn footprint(self) -> usize {
        self.0.with_nul.len()
    }

    /// Address of the canonical instance, for identity checks and hashing.
    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *const u8 {
        self.0.with_nul.as_ptr().cast_const().cast::<u8>()
    }

    /// Case-sensitive comparison with `other`.
    #[must_use]
    pub fn compare(self, other: &str) -> Ordering {
        self.as_str().cmp(other)
    }

    /// ASCII case-insensitive comparison with `other`.
    #[must_use]
    pub fn compare_no_case(self, other: &str) -> Ordering {
        let lhs = self.as_str().bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl PartialEq for UniqueStr<'_> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl Eq for UniqueStr<'_> {}

impl Hash for UniqueStr<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.0, state);
    }
}

impl PartialOrd for UniqueStr<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UniqueStr<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        // Equal content only happens across interners; order by address then.
        self.as_str()
            .cmp(other.as_str())
            .then_with(|| self.as_ptr().cmp(&other.as_ptr()))
    }
}

impl PartialEq<str> for UniqueStr<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for UniqueStr<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<UniqueStr<'_>> for &str {
    fn eq(&self, other: &UniqueStr<'_>) -> bool {
        *self == other.as_str()
    }
}

impl Deref for UniqueStr<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for UniqueStr<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for UniqueStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for UniqueStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueStr({:?} @ {:p})", self.as_str(), self.as_ptr())
    }
}
