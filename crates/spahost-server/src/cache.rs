//! Bounded entity cache over the resolver.
//!
//! The cache stores owned [`ResponseEntity`] values keyed by request path.
//! Lazy content loads happen on a copy; the orchestrator pushes the
//! populated copy back via [`EntityCache::put`] so later hits skip the
//! disk (copy-on-fill-and-store). Concurrent misses for the same path may
//! both resolve and both insert; the results are content-identical, so the
//! last write winning is harmless.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::entity::ResponseEntity;
use crate::resolver::EntityResolver;

/// Entity resolution behind a bounded LRU, bypassable via configuration.
pub struct EntityCache {
    resolver: EntityResolver,
    cache: Option<Mutex<LruCache<String, ResponseEntity>>>,
}

impl EntityCache {
    /// Wraps `resolver` in a cache of at most `capacity` entries.
    ///
    /// With `enabled` false (or a zero capacity) every request re-resolves
    /// and re-reads from disk.
    #[must_use]
    pub fn new(resolver: EntityResolver, enabled: bool, capacity: usize) -> Self {
        let cache = if enabled {
            match NonZeroUsize::new(capacity) {
                Some(capacity) => Some(Mutex::new(LruCache::new(capacity))),
                None => {
                    tracing::error!("Failed to create cache: capacity must be non-zero");
                    None
                }
            }
        } else {
            None
        };

        Self { resolver, cache }
    }

    /// Returns the entity for `path`, resolving and inserting on a miss.
    ///
    /// The resolver runs outside the cache lock; requests never block on
    /// another request's disk I/O.
    #[must_use]
    pub fn get(&self, path: &str) -> ResponseEntity {
        let Some(cache) = &self.cache else {
            return self.resolver.resolve(path);
        };

        if let Some(entity) = cache.lock().get(path) {
            return entity.clone();
        }

        let entity = self.resolver.resolve(path);
        cache.lock().put(path.to_string(), entity.clone());
        entity
    }

    /// Replaces the cached entity for `path`, making freshly loaded content
    /// buffers visible to future hits. A no-op when the cache is disabled.
    pub fn put(&self, path: &str, entity: ResponseEntity) {
        if let Some(cache) = &self.cache {
            cache.lock().put(path.to_string(), entity);
        }
    }
}
