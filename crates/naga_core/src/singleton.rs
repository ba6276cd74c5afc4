//! # Lazy Singletons
//!
//! A holder that gives a type at most one process-wide instance, created on
//! first access.
//!
//! Put a [`Singleton`] in a `static` and reach the instance through it:
//!
//! ```rust,ignore
//! static REGISTRY: Singleton<PoolRegistry> = Singleton::new(PoolRegistry::new);
//!
//! let registry = REGISTRY.instance(); // constructed here, once
//! let again = REGISTRY.instance();    // same instance
//! ```
//!
//! The instance can be destroyed explicitly; the next access constructs a
//! fresh one. Handles obtained before the reset keep the old instance alive
//! until they are dropped.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{const_mutex, const_rwlock, Mutex, RwLock};

/// Lazily constructed, process-wide instance of `T`.
///
/// # Thread Safety
///
/// First construction is serialized: a thread that loses the race waits and
/// then receives the winner's instance. Construction must not reenter the same
/// singleton; doing so on the constructing thread is a fatal assertion.
pub struct Singleton<T> {
    /// The live instance, if any.
    instance: RwLock<Option<Arc<T>>>,
    /// Held for the duration of a construction.
    init: Mutex<()>,
    /// Thread currently running the constructor.
    constructing: Mutex<Option<ThreadId>>,
    /// Creation policy.
    create: fn() -> T,
}

/// Clears the constructing marker even if the constructor panics.
struct ConstructionGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl<T> Singleton<T> {
    /// Creates an empty holder that will build its instance with `create`.
    #[must_use]
    pub const fn new(create: fn() -> T) -> Self {
        Self {
            instance: const_rwlock(None),
            init: const_mutex(()),
            constructing: const_mutex(None),
            create,
        }
    }

    /// Returns the instance, constructing it on first call.
    ///
    /// # Panics
    ///
    /// Panics if called from within the constructor of this same singleton.
    pub fn instance(&self) -> Arc<T> {
        if let Some(existing) = self.instance.read().as_ref() {
            return Arc::clone(existing);
        }

        let current = thread::current().id();
        assert!(
            *self.constructing.lock() != Some(current),
            "re-entrant construction of singleton {}",
            type_name::<T>()
        );

        let _init = self.init.lock();
        if let Some(existing) = self.instance.read().as_ref() {
            return Arc::clone(existing);
        }

        *self.constructing.lock() = Some(current);
        let guard = ConstructionGuard(&self.constructing);
        let created = Arc::new((self.create)());
        drop(guard);

        *self.instance.write() = Some(Arc::clone(&created));
        tracing::trace!(singleton = type_name::<T>(), "singleton constructed");
        created
    }

    /// Returns the instance if it has been constructed, without constructing it.
    #[must_use]
    pub fn instance_ptr(&self) -> Option<Arc<T>> {
        self.instance.read().clone()
    }

    /// Checks whether the instance currently exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.instance.read().is_some()
    }

    /// Drops the stored instance so the next access constructs a new one.
    ///
    /// # Returns
    ///
    /// The instance that was stored, if any. It is destroyed once this and
    /// every other outstanding handle are dropped.
    pub fn destroy(&self) -> Option<Arc<T>> {
        let _init = self.init.lock();
        let previous = self.instance.write().take();
        if previous.is_some() {
            tracing::trace!(singleton = type_name::<T>(), "singleton destroyed");
        }
        previous
    }
}

impl<T: Default> Singleton<T> {
    /// Creates an empty holder that builds its instance with `T::default`.
    #[must_use]
    pub const fn with_default() -> Self {
        Self::new(T::default)
    }
}

impl<T> fmt::Debug for Singleton<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singleton")
            .field("type", &type_name::<T>())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
