//! # String Interner
//!
//! Hash-bucketed table of canonical strings backed by a [`ByteArena`].
//!
//! Interning the same content twice returns the same [`UniqueStr`], so every
//! string comparison on interned data reduces to a pointer comparison.
//! Entries are never evicted; their bytes are freed with the interner. The
//! process-wide interner is never dropped.

#![allow(unsafe_code)]

use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::unique::{Entry, UniqueStr};
use crate::memory::{ByteArena, DEFAULT_BUFFER_SIZE};
use crate::singleton::Singleton;

/// Computes the multiply-by-31 rolling hash and the byte length of `s` in
/// one pass.
///
/// Bytes are taken as unsigned values; arithmetic wraps at 32 bits.
#[must_use]
pub fn hash_and_len(s: &str) -> (u32, usize) {
    s.bytes().fold((0u32, 0usize), |(hash, len), byte| {
        (hash.wrapping_mul(31).wrapping_add(u32::from(byte)), len + 1)
    })
}

/// Table and storage, guarded together.
struct InternerState {
    /// Hash code to every entry with that hash, in insertion order.
    table: HashMap<u32, Vec<NonNull<Entry>>>,
    /// Backing storage for the string bytes.
    arena: ByteArena,
    /// Number of distinct strings.
    count: usize,
}

// SAFETY: the state owns its entries and arena; entries are immutable once
// inserted.
unsafe impl Send for InternerState {}

impl InternerState {
    fn lookup(&self, s: &str, hash: u32, len: usize) -> Option<NonNull<Entry>> {
        self.table.get(&hash)?.iter().copied().find(|candidate| {
            // SAFETY: entries live until the state drops.
            let candidate = unsafe { candidate.as_ref() };
            let text = candidate.as_str();
            candidate.hash() == hash && text.len() == len && text == s
        })
    }

    fn insert(&mut self, s: &str, hash: u32) -> NonNull<Entry> {
        let stored = self.arena.alloc_with_nul(s.as_bytes());
        // SAFETY: arena copies stay valid and unchanged until the arena, and
        // with it this state, drops.
        let entry = unsafe { Entry::new(stored, hash) };
        let entry = NonNull::from(Box::leak(Box::new(entry)));

        self.table.entry(hash).or_default().push(entry);
        self.count += 1;
        entry
    }
}

impl Drop for InternerState {
    fn drop(&mut self) {
        for entry in self.table.drain().flat_map(|(_, bucket)| bucket) {
            // SAFETY: every entry came from `Box::leak` in `insert` and sits
            // in exactly one bucket.
            drop(unsafe { Box::from_raw(entry.as_ptr()) });
        }
    }
}

/// Canonical string table.
///
/// # Thread Safety
///
/// Lookups and insertions are serialized by an internal mutex; handles are
/// `Copy + Send + Sync` and borrow the interner.
///
/// # Example
///
/// ```rust,ignore
/// let interner = StringInterner::new();
///
/// let a = interner.intern("bird/bird_hero.png");
/// let b = interner.intern("bird/bird_hero.png");
/// assert_eq!(a, b); // same instance
/// ```
pub struct StringInterner {
    state: Mutex<InternerState>,
}

impl StringInterner {
    /// Creates an interner with 1 KB buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Creates an interner whose backing buffers are `buffer_size` bytes.
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            state: Mutex::new(InternerState {
                table: HashMap::new(),
                arena: ByteArena::new(buffer_size),
                count: 0,
            }),
        }
    }

    /// Returns the canonical instance for `s`, inserting it on first sight.
    pub fn intern(&self, s: &str) -> UniqueStr<'_> {
        let (hash, len) = hash_and_len(s);
        let mut state = self.state.lock();
        let entry = match state.lookup(s, hash, len) {
            Some(existing) => existing,
            None => state.insert(s, hash),
        };
        drop(state);
        self.handle(entry)
    }

    /// Like [`intern`](Self::intern), but absent input yields absent output.
    pub fn intern_opt(&self, s: Option<&str>) -> Option<UniqueStr<'_>> {
        s.map(|s| self.intern(s))
    }

    /// Returns the canonical instance for `s` if it has been interned.
    #[must_use]
    pub fn find(&self, s: &str) -> Option<UniqueStr<'_>> {
        let (hash, len) = hash_and_len(s);
        let entry = self.state.lock().lookup(s, hash, len)?;
        Some(self.handle(entry))
    }

    /// Wraps one of this interner's entries in a handle borrowing `self`.
    fn handle(&self, entry: NonNull<Entry>) -> UniqueStr<'_> {
        // SAFETY: entries are boxed, never moved or removed, and freed only
        // when the interner drops, which the returned borrow prevents.
        UniqueStr::from_entry(unsafe { entry.as_ref() })
    }

    /// Number of distinct strings interned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    /// Checks whether nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries sharing `hash`.
    #[must_use]
    pub fn bucket_len(&self, hash: u32) -> usize {
        self.state.lock().table.get(&hash).map_or(0, Vec::len)
    }

    /// Number of backing buffers allocated.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.state.lock().arena.buffer_count()
    }

    /// Bytes of backing storage in use, terminators included.
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.state.lock().arena.used()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StringInterner")
            .field("strings", &state.count)
            .field("buckets", &state.table.len())
            .field("buffers", &state.arena.buffer_count())
            .finish()
    }
}

static GLOBAL_INTERNER: Singleton<&'static StringInterner> = Singleton::new(leak_global);

fn leak_global() -> &'static StringInterner {
    Box::leak(Box::new(StringInterner::new()))
}

/// Returns the process-wide interner, creating it on first use.
///
/// The process-wide interner is never dropped, so handles it returns are
/// `'static` and stay canonical for the life of the process.
#[must_use]
pub fn interner() -> &'static StringInterner {
    *GLOBAL_INTERNER.instance()
}

/// Interns `s` in the process-wide interner.
pub fn intern(s: &str) -> UniqueStr<'static> {
    interner().intern(s)
}

/// Looks `s` up in the process-wide interner without inserting it.
#[must_use]
pub fn find(s: &str) -> Option<UniqueStr<'static>> {
    interner().find(s)
}
