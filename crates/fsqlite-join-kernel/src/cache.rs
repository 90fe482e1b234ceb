//! The specialization cache: memoizes [`compile_lookup_source_factory`] by
//! [`JoinShape`], so that recompilation happens at most once per shape even
//! under concurrent lookup.

use std::sync::{Arc, OnceLock};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::JoinKernelConfig;
use crate::error::SharedJoinKernelError;
use crate::kernel::compile_lookup_source_factory;
use crate::lookup_source::LookupSourceFactory;
use crate::strategy::JoinShape;
use crate::types::TypeRegistry;

type Slot = Arc<OnceLock<std::result::Result<Arc<LookupSourceFactory>, SharedJoinKernelError>>>;

/// Bounded, single-flight cache of compiled [`LookupSourceFactory`]s, keyed
/// by [`JoinShape`].
///
/// Compilation itself never happens while holding the cache's internal
/// lock: a miss reserves an empty slot under lock, then releases the lock
/// and races to fill that slot with [`OnceLock::get_or_init`]. Concurrent
/// callers for the same never-seen shape therefore block on each other
/// (exactly one compiles), but never block callers touching other shapes.
pub struct SpecializationCache {
    slots: Mutex<LruCache<JoinShape, Slot>>,
}

impl SpecializationCache {
    /// Build a cache with the capacity named in `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.cache_capacity` is zero; a zero-capacity LRU cache
    /// cannot retain anything, which is never a construction the caller
    /// intends.
    #[must_use]
    pub fn new(config: &JoinKernelConfig) -> Self {
        let capacity = std::num::NonZeroUsize::new(config.cache_capacity).expect("cache_capacity must be nonzero");
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the compiled factory for `shape`, compiling and memoizing it
    /// on first request.
    ///
    /// # Errors
    ///
    /// Returns the [`SharedJoinKernelError`] produced by compilation; the
    /// same error is replayed to every caller that raced on the same miss,
    /// and to every later lookup of that shape until it is evicted.
    pub fn get_or_compile(
        &self,
        shape: JoinShape,
        registry: &TypeRegistry,
        config: &JoinKernelConfig,
    ) -> std::result::Result<Arc<LookupSourceFactory>, SharedJoinKernelError> {
        let slot = {
            let mut slots = self.slots.lock();
            if let Some(existing) = slots.get(&shape) {
                existing.clone()
            } else {
                let slot: Slot = Arc::new(OnceLock::new());
                slots.put(shape.clone(), slot.clone());
                slot
            }
        };

        slot.get_or_init(|| {
            debug!(channels = shape.type_vector.len(), "compiling join strategy for new shape");
            compile_lookup_source_factory(&shape, registry, config).map_err(Arc::new)
        })
        .clone()
    }

    /// Number of shapes currently memoized.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;

    fn shape() -> JoinShape {
        JoinShape::new(vec![TypeTag::Int32, TypeTag::Int32], vec![0, 1])
    }

    #[test]
    fn repeated_compiles_of_the_same_shape_agree() {
        let _ = tracing_subscriber::fmt::try_init();
        let cache = SpecializationCache::new(&JoinKernelConfig::default());
        let registry = TypeRegistry::new();
        let config = JoinKernelConfig::default();

        let first = cache.get_or_compile(shape(), &registry, &config).unwrap();
        let second = cache.get_or_compile(shape(), &registry, &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_shapes_get_distinct_entries() {
        let cache = SpecializationCache::new(&JoinKernelConfig::default());
        let registry = TypeRegistry::new();
        let config = JoinKernelConfig::default();

        cache.get_or_compile(shape(), &registry, &config).unwrap();
        cache
            .get_or_compile(JoinShape::new(vec![TypeTag::Bytes], vec![0]), &registry, &config)
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn compilation_failure_is_memoized_and_replayed() {
        let cache = SpecializationCache::new(&JoinKernelConfig::default());
        let registry = TypeRegistry::new();
        let config = JoinKernelConfig::default();
        let bad_shape = JoinShape::new(vec![TypeTag::Custom("unregistered".into())], vec![0]);

        let first = cache.get_or_compile(bad_shape.clone(), &registry, &config).unwrap_err();
        let second = cache.get_or_compile(bad_shape, &registry, &config).unwrap_err();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn eviction_respects_capacity() {
        let mut config = JoinKernelConfig::default();
        config.cache_capacity = 1;
        let cache = SpecializationCache::new(&config);
        let registry = TypeRegistry::new();

        cache.get_or_compile(JoinShape::new(vec![TypeTag::Int32], vec![0]), &registry, &config).unwrap();
        cache.get_or_compile(JoinShape::new(vec![TypeTag::Int64], vec![0]), &registry, &config).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
