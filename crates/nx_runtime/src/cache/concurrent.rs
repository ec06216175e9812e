use std::hash::Hash;

use ahash::RandomState;
use dashmap::DashMap;

use super::{CacheError, KeyedCache, SharedFactory};

/// Optimistic concurrent cache.
///
/// A miss runs the factory without holding any lock and then inserts only if
/// the key is still absent. Two racing threads may both compute, but only
/// the first value is stored and both callers get that stored value.
pub struct ConcurrentCache<K, V> {
    map: DashMap<K, V, RandomState>,
    factory: Option<SharedFactory<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> ConcurrentCache<K, V> {
    pub fn new() -> Self {
        Self::with_factory_opt(None)
    }

    pub fn with_factory(factory: SharedFactory<K, V>) -> Self {
        Self::with_factory_opt(Some(factory))
    }

    pub fn with_factory_opt(factory: Option<SharedFactory<K, V>>) -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
            factory,
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ConcurrentCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> for ConcurrentCache<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        if let Some(v) = self.map.get(key) {
            return Ok(Some(v.value().clone()));
        }
        let Some(factory) = &self.factory else {
            return Ok(None);
        };
        let value = factory.create(key)?;
        let stored = self.map.entry(key.clone()).or_insert(value);
        Ok(Some(stored.value().clone()))
    }

    fn put(&self, key: K, value: V) -> V {
        self.map.insert(key, value.clone()).unwrap_or(value)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&self) {
        self.map.clear();
    }
}
