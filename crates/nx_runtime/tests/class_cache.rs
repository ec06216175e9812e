use std::sync::Arc;

use nx_core::{ClassBuilder, ClassLoader, ClassRef, Instance, Value, builtins};
use nx_runtime::cache::{CacheInspector, ClassCache, TABLE_SIZE};
use nx_runtime::{EvalContext, Runtime, interpreter};
use nx_runtime::ast;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn classes(loader: &ClassLoader, prefix: &str, n: usize) -> Vec<ClassRef> {
    (0..n)
        .map(|i| ClassBuilder::class(&format!("{prefix}{i}")).build(loader).unwrap())
        .collect()
}

#[test]
fn holds_more_classes_than_buckets() {
    let loader = ClassLoader::new("many");
    let all = classes(&loader, "gen.C", 600);
    let mut cache = ClassCache::new();
    for (i, c) in all.iter().enumerate() {
        assert_eq!(cache.put(c.clone(), i), i);
    }
    assert_eq!(cache.size(), 600);
    for (i, c) in all.iter().enumerate() {
        assert_eq!(cache.get(c), Some(i));
    }
    // 600 keys over 512 buckets must share at least one chain.
    assert!(all.iter().any(|c| cache.chain_len(c) > 1));
    assert!(all.iter().all(|c| cache.chain_len(c) <= all.len()));
    assert!(TABLE_SIZE < all.len());

    cache.clear();
    assert_eq!(cache.size(), 0);
    assert!(all.iter().all(|c| cache.get(c).is_none()));
}

#[test]
fn put_replaces_and_returns_previous() {
    let loader = ClassLoader::new("replace");
    let c = ClassBuilder::class("r.A").build(&loader).unwrap();
    let mut cache = ClassCache::new();
    assert_eq!(cache.put(c.clone(), "first"), "first");
    assert_eq!(cache.put(c.clone(), "second"), "first");
    assert_eq!(cache.get(&c), Some("second"));
    assert_eq!(cache.size(), 1);
}

#[test]
fn inspector_can_refuse_entries() {
    let loader = ClassLoader::new("inspect");
    let keep = ClassBuilder::class("keep.A").build(&loader).unwrap();
    let skip = ClassBuilder::class("skip.A").build(&loader).unwrap();
    let inspector: Arc<dyn CacheInspector> = Arc::new(|c: &ClassRef| !c.name().starts_with("skip."));
    let mut cache = ClassCache::new();
    cache.set_inspector(Some(inspector));

    assert_eq!(cache.put(skip.clone(), 1), 1);
    assert_eq!(cache.put(keep.clone(), 2), 2);
    assert_eq!(cache.get(&skip), None);
    assert_eq!(cache.get(&keep), Some(2));
    assert_eq!(cache.size(), 1);

    cache.set_inspector(None);
    cache.put(skip.clone(), 3);
    assert_eq!(cache.get(&skip), Some(3));
}

fn bean(loader: &ClassLoader, name: &str, x: i64) -> Value {
    let class = ClassBuilder::class(name)
        .field("x", &builtins().prim_long)
        .build(loader)
        .unwrap();
    let bean = Instance::new(&class);
    assert!(bean.set_field("x", Value::Int(x)));
    Value::object(bean)
}

#[test]
fn runtime_inspector_reaches_every_class_keyed_cache() {
    let rt = Runtime::new();
    let inspector: Arc<dyn CacheInspector> = Arc::new(|c: &ClassRef| !c.is_reloadable());
    rt.set_class_cache_inspector(Some(inspector));
    let handlers = (rt.property_handlers().len(), rt.method_handlers().len());

    let hot = bean(&ClassLoader::reloadable("hot"), "hot.Bean", 4);
    let mut ctx = EvalContext::new(rt.clone(), hot.clone());
    let x = ast::property("x");
    assert_eq!(interpreter::get_value(&mut ctx, &x, &hot).unwrap(), Value::Int(4));
    assert_eq!(interpreter::get_value(&mut ctx, &x, &hot).unwrap(), Value::Int(4));
    assert_eq!(rt.members().cached_classes(), (0, 0, 0));
    assert_eq!((rt.property_handlers().len(), rt.method_handlers().len()), handlers);

    let stable = bean(&ClassLoader::new("stable"), "stable.Bean", 5);
    assert_eq!(interpreter::get_value(&mut ctx, &x, &stable).unwrap(), Value::Int(5));
    assert_eq!(rt.members().cached_classes().2, 1);
    assert_eq!(rt.property_handlers().len(), handlers.0 + 1);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32, .. ProptestConfig::default()
    })]
    #[test]
    fn same_name_in_two_loaders_is_two_keys(name in "[a-z]{1,8}(\\.[A-Z][a-z]{0,6}){1,2}", a in 0u32..1000, b in 0u32..1000) {
        let first = ClassLoader::new("first");
        let second = ClassLoader::new("second");
        let x = ClassBuilder::class(&name).build(&first).unwrap();
        let y = ClassBuilder::class(&name).build(&second).unwrap();
        prop_assert_eq!(x.name(), y.name());
        prop_assert!(!x.ptr_eq(&y));

        let mut cache = ClassCache::new();
        cache.put(x.clone(), a);
        cache.put(y.clone(), b);
        prop_assert_eq!(cache.size(), 2);
        prop_assert_eq!(cache.get(&x), Some(a));
        prop_assert_eq!(cache.get(&y), Some(b));
    }
}
