mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use nx_runtime::ast;
use nx_runtime::cache::CacheStrategy;
use nx_runtime::{Runtime, RuntimeConfig};

use common::{Demo, float};

#[test]
fn racing_compilations_bind_one_accessor() {
    let demo = Arc::new(Demo::new());
    let rt = Runtime::new();
    let node = ast::path("prop1.radius");
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let (demo, rt, node, barrier) = (demo.clone(), rt.clone(), node.clone(), barrier.clone());
            thread::spawn(move || {
                let root = demo.holder(demo.circle(i as f64));
                let mut ctx = demo.context(&rt, root.clone());
                barrier.wait();
                rt.compile(&mut ctx, &node, &root).unwrap();
                float(&rt.get_value(&mut ctx, &node).unwrap())
            })
        })
        .collect();
    let results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, (0..8).map(|i| i as f64).collect::<Vec<_>>());

    let bound = node.accessor().unwrap();
    let pool = rt.compiler().pools().pool_for(demo.loader.id());
    assert!(pool.defined().iter().any(|name| &**name == bound.class_name()));
    assert_eq!(rt.compiler().pools().created(), 1);
}

#[test]
fn member_metadata_is_shared_across_threads() {
    for strategy in [CacheStrategy::Optimistic, CacheStrategy::ReadWriteLock] {
        let demo = Arc::new(Demo::new());
        let config = RuntimeConfig {
            cache_strategy: strategy,
            ..RuntimeConfig::default()
        };
        let rt = Runtime::builder().config(config).build();
        let barrier = Arc::new(Barrier::new(6));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (demo, rt, barrier) = (demo.clone(), rt.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    rt.members().properties(&demo.circle).unwrap()
                })
            })
            .collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = rt.members().properties(&demo.circle).unwrap();
        assert!(tables.iter().all(|t| Arc::ptr_eq(t, &stored)), "{strategy:?}");
        assert!(stored.get("radius").is_some_and(|p| p.is_writable()));
    }
}

#[test]
fn handler_resolution_is_consistent_under_contention() {
    let demo = Arc::new(Demo::new());
    let rt = Runtime::new();
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (demo, rt, barrier) = (demo.clone(), rt.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                let a = rt.property_accessor(&demo.circle).unwrap();
                let b = rt.method_accessor(&demo.square).unwrap();
                (Arc::as_ptr(&a) as *const () as usize, Arc::as_ptr(&b) as *const () as usize)
            })
        })
        .collect();
    let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
    let settled = rt.property_handlers().stats();
    rt.property_accessor(&demo.circle).unwrap();
    assert_eq!(rt.property_handlers().stats(), settled);
}
