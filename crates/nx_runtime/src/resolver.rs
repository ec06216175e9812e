//! Nearest-handler lookup over class hierarchies.
//!
//! Handlers (property accessors, method accessors, ...) are registered for a
//! few classes and interfaces. A lookup for any other class walks its
//! superclass chain, scanning each level's declared interfaces, and
//! memoizes the answer under the class it started from.

use std::sync::atomic::{AtomicUsize, Ordering};

use nx_core::{ClassRef, builtins};
use parking_lot::Mutex;

use crate::cache::ClassCache;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Lookups that missed the cache and walked the hierarchy.
    pub walks: usize,
    /// Declared-interface scans performed during walks.
    pub interface_scans: usize,
}

#[derive(Default)]
pub struct HierarchyResolver {
    walks: AtomicUsize,
    interface_scans: AtomicUsize,
}

impl HierarchyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ResolveStats {
        ResolveStats {
            walks: self.walks.load(Ordering::Relaxed),
            interface_scans: self.interface_scans.load(Ordering::Relaxed),
        }
    }

    /// Most specific handler for `class`, or `None`.
    ///
    /// The handler table stays locked for the whole lookup so a miss is
    /// computed and memoized once.
    pub fn resolve<V: Clone>(&self, class: &ClassRef, handlers: &Mutex<ClassCache<V>>) -> Option<V> {
        let mut cache = handlers.lock();
        self.resolve_locked(class, &mut cache)
    }

    pub fn resolve_locked<V: Clone>(&self, class: &ClassRef, cache: &mut ClassCache<V>) -> Option<V> {
        if let Some(hit) = cache.get(class) {
            return Some(hit);
        }
        self.walks.fetch_add(1, Ordering::Relaxed);

        let (answer, key_found) = if class.is_array() {
            (cache.get(&builtins().object_array), None)
        } else {
            self.walk(class, cache)
        };

        let answer = answer?;
        if key_found.as_ref().is_none_or(|k| !k.ptr_eq(class)) {
            tracing::trace!(
                class = %class,
                found_under = ?key_found,
                "memoizing resolved handler"
            );
            cache.put(class.clone(), answer.clone());
        }
        Some(answer)
    }

    fn walk<V: Clone>(&self, class: &ClassRef, cache: &mut ClassCache<V>) -> (Option<V>, Option<ClassRef>) {
        let mut cur = Some(class.clone());
        while let Some(c) = cur {
            if let Some(hit) = cache.get(&c) {
                return (Some(hit), Some(c));
            }
            self.interface_scans.fetch_add(1, Ordering::Relaxed);
            for iface in c.interfaces() {
                let hit = match cache.get(iface) {
                    Some(hit) => Some(hit),
                    None => self.resolve_locked(iface, cache),
                };
                if hit.is_some() {
                    return (hit, Some(iface.clone()));
                }
            }
            cur = c.superclass().cloned();
        }
        (None, None)
    }
}
