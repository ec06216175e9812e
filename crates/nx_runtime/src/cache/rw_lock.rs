use std::hash::Hash;

use nx_core::{FastHashMap, fast_map_new};
use parking_lot::RwLock;

use super::{CacheError, KeyedCache, SharedFactory};

/// Reader/writer-lock guarded cache.
///
/// Hits only take the read lock. A miss with a factory escalates to the
/// write lock and re-checks before computing, so the factory runs at most
/// once per key even under contention.
pub struct ReadWriteLockCache<K, V> {
    map: RwLock<FastHashMap<K, V>>,
    factory: Option<SharedFactory<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> ReadWriteLockCache<K, V> {
    pub fn new() -> Self {
        Self::with_factory_opt(None)
    }

    pub fn with_factory(factory: SharedFactory<K, V>) -> Self {
        Self::with_factory_opt(Some(factory))
    }

    pub fn with_factory_opt(factory: Option<SharedFactory<K, V>>) -> Self {
        Self {
            map: RwLock::new(fast_map_new()),
            factory,
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ReadWriteLockCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> for ReadWriteLockCache<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        if let Some(v) = self.map.read().get(key) {
            return Ok(Some(v.clone()));
        }
        let Some(factory) = &self.factory else {
            return Ok(None);
        };
        let mut map = self.map.write();
        if let Some(v) = map.get(key) {
            return Ok(Some(v.clone()));
        }
        let value = factory.create(key)?;
        map.insert(key.clone(), value.clone());
        Ok(Some(value))
    }

    fn put(&self, key: K, value: V) -> V {
        self.map.write().insert(key, value.clone()).unwrap_or(value)
    }

    fn len(&self) -> usize {
        self.map.read().len()
    }

    fn clear(&self) {
        self.map.write().clear();
    }
}
