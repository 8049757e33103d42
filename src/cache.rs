//! In memory cache of provider sets per content key.

use std::{fmt::Debug, num::NonZeroUsize};

use bytes::Bytes;
use lru::LruCache;

use crate::defaults::DEFAULT_CACHE_SIZE;
use crate::provider_set::ProviderSet;

/// A cache of [ProviderSet]s keyed by content key.
///
/// Only ever used from the manager's worker thread, so implementations need
/// no internal synchronization, only to be [Send].
pub trait ProviderCache: Send + Debug {
    /// Returns the cached set for `key`, marking it as recently used.
    fn get(&mut self, key: &[u8]) -> Option<&mut ProviderSet>;

    /// Caches `set` for `key`, possibly evicting another entry.
    fn add(&mut self, key: Bytes, set: ProviderSet);

    /// Drops every cached entry.
    fn purge(&mut self);
}

#[derive(Debug)]
/// Fixed capacity, least recently used eviction [ProviderCache].
pub struct LruProviderCache {
    sets: LruCache<Bytes, ProviderSet>,
}

impl LruProviderCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            sets: LruCache::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl Default for LruProviderCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

impl ProviderCache for LruProviderCache {
    fn get(&mut self, key: &[u8]) -> Option<&mut ProviderSet> {
        self.sets.get_mut(key)
    }

    fn add(&mut self, key: Bytes, set: ProviderSet) {
        self.sets.put(key, set);
    }

    fn purge(&mut self) {
        self.sets.clear();
    }
}
