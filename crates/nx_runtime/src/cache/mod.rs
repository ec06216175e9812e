//! Memoizing caches for introspection metadata.
//!
//! - `KeyedCache` - key to lazily created value, three locking strategies
//! - `ClassCache` - fixed bucket table keyed by class identity

mod class_cache;
mod concurrent;
mod hash_map;
mod rw_lock;

use std::hash::Hash;
use std::sync::Arc;

pub use class_cache::{CacheInspector, ClassCache, TABLE_SIZE};
pub use concurrent::ConcurrentCache;
pub use hash_map::HashMapCache;
pub use rw_lock::ReadWriteLockCache;

pub use crate::errors::CacheError;

/// Creates the value for a missing key.
pub trait EntryFactory<K, V>: Send + Sync {
    fn create(&self, key: &K) -> Result<V, CacheError>;
}

impl<K, V, F> EntryFactory<K, V> for F
where
    F: Fn(&K) -> Result<V, CacheError> + Send + Sync,
{
    fn create(&self, key: &K) -> Result<V, CacheError> {
        self(key)
    }
}

pub type SharedFactory<K, V> = Arc<dyn EntryFactory<K, V>>;

pub trait KeyedCache<K, V> {
    /// Cached value for `key`. On a miss the factory, if any, creates and
    /// stores it; a failing factory stores nothing.
    fn get(&self, key: &K) -> Result<Option<V>, CacheError>;

    /// Stores `value`, returning the value it replaced or `value` itself.
    fn put(&self, key: K, value: V) -> V;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

/// Thread-safe strategies the runtime can be configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Factory runs outside any lock; the first stored value wins a race.
    #[default]
    Optimistic,
    /// Factory runs under the write lock, at most once per key.
    ReadWriteLock,
}

impl CacheStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" | "concurrent" => Some(CacheStrategy::Optimistic),
            "rwlock" | "rw" | "locked" => Some(CacheStrategy::ReadWriteLock),
            _ => None,
        }
    }

    pub fn build<K, V>(self, factory: Option<SharedFactory<K, V>>) -> Box<dyn KeyedCache<K, V> + Send + Sync>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self {
            CacheStrategy::Optimistic => Box::new(ConcurrentCache::with_factory_opt(factory)),
            CacheStrategy::ReadWriteLock => Box::new(ReadWriteLockCache::with_factory_opt(factory)),
        }
    }
}
