use std::cell::RefCell;
use std::hash::Hash;

use nx_core::{FastHashMap, fast_map_new};

use super::{CacheError, KeyedCache, SharedFactory};

/// Unsynchronized cache for single-threaded embeddings. Not `Sync`.
pub struct HashMapCache<K, V> {
    map: RefCell<FastHashMap<K, V>>,
    factory: Option<SharedFactory<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> HashMapCache<K, V> {
    pub fn new() -> Self {
        Self {
            map: RefCell::new(fast_map_new()),
            factory: None,
        }
    }

    pub fn with_factory(factory: SharedFactory<K, V>) -> Self {
        Self {
            map: RefCell::new(fast_map_new()),
            factory: Some(factory),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for HashMapCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> for HashMapCache<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        if let Some(v) = self.map.borrow().get(key) {
            return Ok(Some(v.clone()));
        }
        let Some(factory) = &self.factory else {
            return Ok(None);
        };
        // The factory may consult this cache, so no borrow is held across it.
        let value = factory.create(key)?;
        self.map.borrow_mut().insert(key.clone(), value.clone());
        Ok(Some(value))
    }

    fn put(&self, key: K, value: V) -> V {
        self.map.borrow_mut().insert(key, value.clone()).unwrap_or(value)
    }

    fn len(&self) -> usize {
        self.map.borrow().len()
    }

    fn clear(&self) {
        self.map.borrow_mut().clear();
    }
}
