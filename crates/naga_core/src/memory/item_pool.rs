//! # Item Pool
//!
//! A recycling list for values that are expensive to rebuild, such as
//! scratch buffers or spent effect instances. The pool only stores what it
//! is given; it never creates or resets items.

/// Stack of spare items, handed back most recently added first.
///
/// # Example
///
/// ```rust,ignore
/// let mut spare: ItemPool<Vec<u8>> = ItemPool::new();
/// spare.add(Vec::with_capacity(4096));
///
/// let buffer = spare.remove().unwrap_or_default();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ItemPool<T> {
    items: Vec<T>,
}

impl<T> ItemPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of spare items.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Checks whether the pool has nothing to hand out.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stores `item` for later reuse.
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    /// Takes the most recently added item, if any.
    pub fn remove(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Drops every stored item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_come_back_newest_first() {
        let mut pool = ItemPool::new();
        pool.add("first");
        pool.add("second");
        assert_eq!(pool.count(), 2);

        assert_eq!(pool.remove(), Some("second"));
        assert_eq!(pool.remove(), Some("first"));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_remove_from_empty_pool() {
        let mut pool: ItemPool<u32> = ItemPool::default();
        assert_eq!(pool.remove(), None);
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_recycled_buffer_keeps_capacity() {
        let mut pool: ItemPool<Vec<u8>> = ItemPool::new();
        let mut buffer = Vec::with_capacity(256);
        buffer.extend_from_slice(b"frame");
        buffer.clear();
        pool.add(buffer);

        let reused = pool.remove().unwrap_or_default();
        assert!(reused.capacity() >= 256);
        assert!(reused.is_empty());
    }

    #[test]
    fn test_clear_drops_items() {
        let marker = std::rc::Rc::new(());
        let mut pool = ItemPool::new();
        pool.add(std::rc::Rc::clone(&marker));
        pool.add(std::rc::Rc::clone(&marker));
        assert_eq!(std::rc::Rc::strong_count(&marker), 3);

        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(std::rc::Rc::strong_count(&marker), 1);
    }
}
