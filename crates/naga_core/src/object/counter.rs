//! # Instance Counters
//!
//! Per-type live-instance tracking for leak hunting.
//!
//! A type that wants to be counted embeds a [`CountedInstance`] obtained from
//! a `static` [`InstanceCounter`]. Every construction and every clone bumps the
//! live count and takes the next serial number; every drop decrements.
//!
//! ```rust,ignore
//! static SPRITES: InstanceCounter = InstanceCounter::new("Sprite");
//!
//! #[derive(Clone)]
//! struct Sprite { base: Object, tracked: CountedInstance }
//!
//! let sprite = Sprite { base: Object::new(), tracked: SPRITES.track() };
//! assert_eq!(SPRITES.live(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Live count and serial source for one type.
pub struct InstanceCounter {
    /// Name used in diagnostics.
    name: &'static str,
    /// Instances currently alive.
    live: AtomicI64,
    /// Serials handed out so far.
    serial: AtomicU64,
}

impl InstanceCounter {
    /// Creates a counter with nothing alive.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            live: AtomicI64::new(0),
            serial: AtomicU64::new(0),
        }
    }

    /// Name used in diagnostics.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Instances currently alive.
    #[must_use]
    pub fn live(&self) -> i64 {
        self.live.load(Ordering::Relaxed)
    }

    /// Serials handed out so far; the last instance created carries this one.
    #[must_use]
    pub fn last_serial(&self) -> u64 {
        self.serial.load(Ordering::Relaxed)
    }

    /// Registers a new instance.
    #[must_use]
    pub fn track(&'static self) -> CountedInstance {
        self.live.fetch_add(1, Ordering::Relaxed);
        let serial = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
        CountedInstance {
            counter: self,
            serial,
        }
    }

    /// Logs the live count if anything is still alive.
    ///
    /// # Returns
    ///
    /// `true` if no instance is alive.
    pub fn report(&self) -> bool {
        let live = self.live();
        if live != 0 {
            tracing::warn!(ty = self.name, live, "instances still alive");
        }
        live == 0
    }
}

impl fmt::Debug for InstanceCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCounter")
            .field("name", &self.name)
            .field("live", &self.live())
            .field("last_serial", &self.last_serial())
            .finish()
    }
}

/// Membership token of one counted instance.
///
/// Cloning registers a new instance with a fresh serial.
pub struct CountedInstance {
    counter: &'static InstanceCounter,
    serial: u64,
}

impl CountedInstance {
    /// Serial number of this instance, starting at 1.
    #[inline]
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// The counter this instance belongs to.
    #[inline]
    #[must_use]
    pub const fn counter(&self) -> &'static InstanceCounter {
        self.counter
    }
}

impl Clone for CountedInstance {
    fn clone(&self) -> Self {
        self.counter.track()
    }
}

impl Drop for CountedInstance {
    fn drop(&mut self) {
        self.counter.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for CountedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.counter.name, self.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_and_drop() {
        static COUNTER: InstanceCounter = InstanceCounter::new("TrackAndDrop");

        let a = COUNTER.track();
        let b = COUNTER.track();
        assert_eq!(COUNTER.live(), 2);
        assert_eq!((a.serial(), b.serial()), (1, 2));
        assert!(!COUNTER.report());

        drop(a);
        drop(b);
        assert_eq!(COUNTER.live(), 0);
        assert_eq!(COUNTER.last_serial(), 2);
        assert!(COUNTER.report());
    }

    #[test]
    fn test_clone_counts_as_new_instance() {
        static COUNTER: InstanceCounter = InstanceCounter::new("Cloned");

        let original = COUNTER.track();
        let copy = original.clone();
        assert_eq!(COUNTER.live(), 2);
        assert_eq!(copy.serial(), original.serial() + 1);
        assert_eq!(format!("{copy:?}"), "Cloned#2");
        assert!(std::ptr::eq(copy.counter(), &COUNTER));
    }
}
