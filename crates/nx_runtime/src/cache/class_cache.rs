//! Class-keyed cache with a fixed bucket table.
//!
//! Keys are compared by identity, never by name: the same class name
//! defined by two loaders yields two independent entries. The table never
//! grows; collisions only lengthen a bucket's chain.

use std::sync::Arc;

use nx_core::ClassRef;

pub const TABLE_SIZE: usize = 512;
const TABLE_SIZE_MASK: usize = TABLE_SIZE - 1;

/// Decides whether a class may be cached at all.
pub trait CacheInspector: Send + Sync {
    fn should_cache(&self, class: &ClassRef) -> bool;
}

impl<F> CacheInspector for F
where
    F: Fn(&ClassRef) -> bool + Send + Sync,
{
    fn should_cache(&self, class: &ClassRef) -> bool {
        self(class)
    }
}

struct Entry<V> {
    key: ClassRef,
    value: V,
    next: Option<Box<Entry<V>>>,
}

pub struct ClassCache<V> {
    table: Box<[Option<Box<Entry<V>>>]>,
    size: usize,
    inspector: Option<Arc<dyn CacheInspector>>,
}

#[inline]
fn bucket(class: &ClassRef) -> usize {
    class.identity_hash() as usize & TABLE_SIZE_MASK
}

impl<V: Clone> ClassCache<V> {
    pub fn new() -> Self {
        Self {
            table: (0..TABLE_SIZE).map(|_| None).collect(),
            size: 0,
            inspector: None,
        }
    }

    pub fn set_inspector(&mut self, inspector: Option<Arc<dyn CacheInspector>>) {
        self.inspector = inspector;
    }

    pub fn clear(&mut self) {
        for slot in self.table.iter_mut() {
            // Unlink iteratively so long chains don't recurse on drop.
            let mut head = slot.take();
            while let Some(mut entry) = head {
                head = entry.next.take();
            }
        }
        self.size = 0;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, key: &ClassRef) -> Option<V> {
        let mut entry = self.table[bucket(key)].as_deref();
        while let Some(e) = entry {
            if e.key.ptr_eq(key) {
                return Some(e.value.clone());
            }
            entry = e.next.as_deref();
        }
        None
    }

    /// Stores `value` under `key` and returns the replaced value, or `value`
    /// when the key was new or the inspector refused to cache it.
    pub fn put(&mut self, key: ClassRef, value: V) -> V {
        if let Some(inspector) = &self.inspector {
            if !inspector.should_cache(&key) {
                tracing::trace!(class = %key, "class cache inspector declined entry");
                return value;
            }
        }
        let slot = &mut self.table[bucket(&key)];
        let mut entry = slot.as_deref_mut();
        while let Some(e) = entry {
            if e.key.ptr_eq(&key) {
                return std::mem::replace(&mut e.value, value);
            }
            entry = e.next.as_deref_mut();
        }
        let next = slot.take();
        *slot = Some(Box::new(Entry {
            key,
            value: value.clone(),
            next,
        }));
        self.size += 1;
        value
    }

    /// Number of entries chained in the bucket `class` hashes to.
    pub fn chain_len(&self, class: &ClassRef) -> usize {
        let mut n = 0;
        let mut entry = self.table[bucket(class)].as_deref();
        while let Some(e) = entry {
            n += 1;
            entry = e.next.as_deref();
        }
        n
    }
}

impl<V: Clone> Default for ClassCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for ClassCache<V> {
    fn drop(&mut self) {
        for slot in self.table.iter_mut() {
            let mut head = slot.take();
            while let Some(mut entry) = head {
                head = entry.next.take();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_core::{ClassBuilder, ClassLoader};

    #[test]
    fn put_returns_previous_value_on_replace() {
        let loader = ClassLoader::new("class-cache-unit");
        let a = ClassBuilder::class("unit.A").build(&loader).unwrap();
        let mut cache = ClassCache::new();
        assert_eq!(cache.put(a.clone(), 1), 1);
        assert_eq!(cache.put(a.clone(), 2), 1);
        assert_eq!(cache.get(&a), Some(2));
        assert_eq!(cache.size(), 1);
    }
}
