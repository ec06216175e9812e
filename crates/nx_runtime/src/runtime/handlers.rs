use std::sync::Arc;

use nx_core::ClassRef;
use parking_lot::Mutex;

use crate::cache::{CacheInspector, ClassCache};
use crate::resolver::{HierarchyResolver, ResolveStats};

/// Handlers registered per class or interface, looked up for any class
/// through its hierarchy.
pub struct HandlerTable<V> {
    kind: &'static str,
    cache: Mutex<ClassCache<V>>,
    resolver: HierarchyResolver,
}

impl<V: Clone> HandlerTable<V> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            cache: Mutex::new(ClassCache::new()),
            resolver: HierarchyResolver::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns the handler previously registered for `class`, or `handler`.
    pub fn register(&self, class: &ClassRef, handler: V) -> V {
        self.cache.lock().put(class.clone(), handler)
    }

    pub fn resolve(&self, class: &ClassRef) -> Option<V> {
        self.resolver.resolve(class, &self.cache)
    }

    pub fn set_inspector(&self, inspector: Option<Arc<dyn CacheInspector>>) {
        self.cache.lock().set_inspector(inspector);
    }

    /// Entries held, registered and memoized.
    pub fn len(&self) -> usize {
        self.cache.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ResolveStats {
        self.resolver.stats()
    }
}
