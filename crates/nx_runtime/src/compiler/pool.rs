//! Compilation pools, one per class loader.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use nx_core::{FastHashMap, LoaderId};
use parking_lot::Mutex;

/// Names and records the accessor classes generated for one loader.
pub struct CompilationPool {
    loader: LoaderId,
    next_id: AtomicU64,
    defined: Mutex<Vec<Arc<str>>>,
}

impl CompilationPool {
    fn new(loader: LoaderId) -> Self {
        Self {
            loader,
            next_id: AtomicU64::new(0),
            defined: Mutex::new(Vec::new()),
        }
    }

    pub fn loader(&self) -> LoaderId {
        self.loader
    }

    /// `{kind}{n}Accessor`, unique within the pool.
    pub fn next_class_name(&self, kind: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{kind}{id}Accessor")
    }

    pub fn record_defined(&self, name: &str) {
        self.defined.lock().push(Arc::from(name));
    }

    pub fn defined(&self) -> Vec<Arc<str>> {
        self.defined.lock().clone()
    }
}

/// Maps each loader to its pool. Creation happens under the registry lock,
/// so concurrent compilations against a new loader share one pool.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<FastHashMap<LoaderId, Arc<CompilationPool>>>,
    created: AtomicUsize,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_for(&self, loader: LoaderId) -> Arc<CompilationPool> {
        let mut pools = self.pools.lock();
        pools
            .entry(loader)
            .or_insert_with(|| {
                self.created.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(loader = loader.0, "creating compilation pool");
                Arc::new(CompilationPool::new(loader))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pools created over the registry's lifetime, including cleared ones.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.pools.lock().clear();
    }
}
