//! # Runtime Context
//!
//! Bundles the interner and the pool registry so drivers can pass one value
//! around instead of reaching for process-wide state.
//!
//! ```rust,ignore
//! let runtime = Runtime::new(RuntimeConfig::from_toml_file("naga.toml")?)?;
//! let name = runtime.intern("bird/bird_hero.png");
//! let cell = runtime.pools().allocate_default::<Particle>();
//! ```

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::RuntimeResult;
use crate::memory::{pool_registry, PoolRegistry};
use crate::strings::{interner, StringInterner, UniqueStr};

/// Where a context's strings live.
#[derive(Debug, Clone)]
enum Strings {
    /// Owned by the context, freed with its last clone.
    Owned(Arc<StringInterner>),
    /// The process-wide interner.
    Global(&'static StringInterner),
}

/// Interner plus pool registry.
///
/// Strings interned through a context borrow it; drop the context and its
/// interner's storage goes with it.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    strings: Strings,
    pools: Arc<PoolRegistry>,
}

impl Runtime {
    /// Creates a context with its own interner and registry.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure of `config`.
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        let runtime = Self {
            strings: Strings::Owned(Arc::new(StringInterner::with_buffer_size(
                config.string_buffer_size,
            ))),
            pools: Arc::new(PoolRegistry::from_config(&config)),
            config,
        };
        tracing::debug!(
            string_buffer_size = runtime.config.string_buffer_size,
            default_objects_per_block = runtime.config.default_objects_per_block,
            "runtime created"
        );
        Ok(runtime)
    }

    /// A context over the process-wide interner and registry.
    #[must_use]
    pub fn global() -> Self {
        Self {
            config: RuntimeConfig::default(),
            strings: Strings::Global(interner()),
            pools: pool_registry(),
        }
    }

    /// Settings this context was built with.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The context's interner.
    #[must_use]
    pub fn strings(&self) -> &StringInterner {
        match &self.strings {
            Strings::Owned(owned) => owned,
            Strings::Global(global) => global,
        }
    }

    /// The context's pool registry.
    #[must_use]
    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    /// Interns `s` in this context.
    pub fn intern(&self, s: &str) -> UniqueStr<'_> {
        self.strings().intern(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;

    #[test]
    fn test_contexts_are_isolated() {
        let a = Runtime::new(RuntimeConfig::default()).unwrap();
        let b = Runtime::new(RuntimeConfig::default()).unwrap();

        let from_a = a.intern("scene/title");
        let from_b = b.intern("scene/title");
        assert_eq!(from_a, a.intern("scene/title"));
        assert_ne!(from_a, from_b);
        assert_eq!(from_a.as_str(), from_b.as_str());
        assert!(!Arc::ptr_eq(a.pools(), b.pools()));
    }

    #[test]
    fn test_global_context_shares_process_state() {
        let runtime = Runtime::global();
        assert!(std::ptr::eq(runtime.strings(), interner()));
        assert!(Arc::ptr_eq(runtime.pools(), &pool_registry()));
        assert_eq!(runtime.intern("naga.test.runtime"), crate::strings::intern("naga.test.runtime"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RuntimeConfig {
            default_objects_per_block: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(Runtime::new(config).unwrap_err(), RuntimeError::ZeroCapacity);
    }

    #[test]
    fn test_config_applied() {
        let config = RuntimeConfig {
            string_buffer_size: 64,
            default_objects_per_block: 4,
            max_alignment: 16,
        };
        let runtime = Runtime::new(config.clone()).unwrap();
        assert_eq!(runtime.config(), &config);
        assert_eq!(runtime.pools().default_capacity(), 4);
        assert_eq!(runtime.strings().buffer_count(), 1);
    }

    #[test]
    fn test_dropped_context_releases_strings() {
        // Each context fills a 4 MiB string buffer; 200 leaked contexts would
        // hold 800 MiB of touched memory.
        const SIZE: usize = 4 << 20;
        let payload = "r".repeat(SIZE - 2);
        for _ in 0..200 {
            let runtime = Runtime::new(RuntimeConfig {
                string_buffer_size: SIZE,
                ..RuntimeConfig::default()
            })
            .unwrap();
            assert_eq!(runtime.intern(&payload).footprint(), SIZE - 1);
            assert_eq!(runtime.strings().bytes_used(), SIZE - 1);
        }
    }

    #[test]
    fn test_clones_share_one_interner() {
        let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
        let copy = runtime.clone();
        let name = runtime.intern("scene/shared");
        assert!(std::ptr::eq(runtime.strings(), copy.strings()));
        assert_eq!(copy.strings().find("scene/shared").map(UniqueStr::as_ptr), Some(name.as_ptr()));
    }
}
