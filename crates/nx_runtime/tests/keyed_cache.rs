use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use nx_runtime::cache::{
    CacheError, CacheStrategy, ConcurrentCache, HashMapCache, KeyedCache, ReadWriteLockCache, SharedFactory,
};

fn counting_factory(calls: Arc<AtomicUsize>) -> SharedFactory<u32, String> {
    Arc::new(move |k: &u32| -> Result<_, CacheError> {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::yield_now();
        Ok(format!("v{k}"))
    })
}

#[test]
fn plain_cache_creates_once_and_reuses() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = HashMapCache::with_factory(counting_factory(calls.clone()));
    assert_eq!(cache.get(&1).unwrap().as_deref(), Some("v1"));
    assert_eq!(cache.get(&1).unwrap().as_deref(), Some("v1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_without_factory_misses() {
    let cache: ConcurrentCache<u32, String> = ConcurrentCache::new();
    assert_eq!(cache.get(&3).unwrap(), None);
    assert!(cache.is_empty());
}

#[test]
fn put_returns_replaced_value() {
    let caches: Vec<Box<dyn KeyedCache<u32, String> + Send + Sync>> = vec![
        Box::new(ConcurrentCache::new()),
        Box::new(ReadWriteLockCache::new()),
    ];
    for cache in caches {
        assert_eq!(cache.put(1, "a".into()), "a");
        assert_eq!(cache.put(1, "b".into()), "a");
        assert_eq!(cache.get(&1).unwrap().as_deref(), Some("b"));
        cache.clear();
        assert!(cache.is_empty());
    }
}

#[test]
fn failing_factory_stores_nothing() {
    for strategy in [CacheStrategy::Optimistic, CacheStrategy::ReadWriteLock] {
        let factory: SharedFactory<u32, String> =
            Arc::new(|k: &u32| -> Result<String, CacheError> { Err(CacheError::factory(k, "boom")) });
        let cache = strategy.build(Some(factory));
        let err = cache.get(&9).unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
        assert_eq!(cache.len(), 0);
    }
}

#[test]
fn rwlock_cache_runs_factory_once_under_contention() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(ReadWriteLockCache::with_factory(counting_factory(calls.clone())));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get(&42).unwrap()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().as_deref(), Some("v42"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn optimistic_cache_hands_every_racer_the_stored_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory: SharedFactory<u32, Arc<String>> = {
        let calls = calls.clone();
        Arc::new(move |k: &u32| -> Result<_, CacheError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(format!("v{k}")))
        })
    };
    let cache = Arc::new(ConcurrentCache::with_factory(factory));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get(&7).unwrap().unwrap()
            })
        })
        .collect();
    let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let stored = cache.get(&7).unwrap().unwrap();
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &stored)));
    assert_eq!(cache.len(), 1);
    assert!(calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn strategy_names_parse() {
    assert_eq!(CacheStrategy::parse("rwlock"), Some(CacheStrategy::ReadWriteLock));
    assert_eq!(CacheStrategy::parse(" Optimistic "), Some(CacheStrategy::Optimistic));
    assert_eq!(CacheStrategy::parse("lru"), None);
}
