mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use nx_core::{ClassBuilder, Instance, Value, builtins};
use nx_runtime::ast::{self, Node};
use nx_runtime::compiler::{AccessorBackend, AccessorClass, CompilationPool, NodeAccessor};
use nx_runtime::errors::{BackendError, CompileCause, EvalError};
use nx_runtime::{Runtime, RuntimeConfig, interpreter};

use common::{Demo, float};

fn accessor_of(node: &Node) -> &Arc<dyn NodeAccessor> {
    node.accessor().expect("node should be compiled")
}

#[test]
fn nested_property_casts_to_declaring_class() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(2.0));
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::path("prop1.radius");

    rt.compile(&mut ctx, &node, &root).unwrap();
    let acc = accessor_of(&node);
    assert!(
        acc.get_source()
            .contains("((demo.Circle)((demo.Holder)$2).getProp1()).getRadius()"),
        "{}",
        acc.get_source()
    );
    assert!(acc.set_source().contains(".setRadius($3)"), "{}", acc.set_source());
    assert_eq!(float(&acc.get(&mut ctx, &root).unwrap()), 2.0);

    let trace = acc.type_trace();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].current_type, Some(demo.shape.clone()));
    assert_eq!(trace[0].current_accessor, Some(demo.holder.clone()));
    assert_eq!(trace[1].current_type, Some(builtins().prim_double.clone()));
    assert_eq!(trace[1].current_accessor, Some(demo.circle.clone()));
    assert_eq!(trace[1].previous_type, Some(demo.shape.clone()));
}

#[test]
fn compiled_setter_writes_through() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let circle = demo.circle(1.0);
    let root = demo.holder(circle.clone());
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::path("prop1.radius");

    rt.compile(&mut ctx, &node, &root).unwrap();
    rt.set_value(&mut ctx, &node, Value::Float(4.5)).unwrap();
    assert_eq!(circle.as_object().unwrap().get_field("radius"), Some(Value::Float(4.5)));
    assert_eq!(float(&rt.get_value(&mut ctx, &node).unwrap()), 4.5);
}

#[test]
fn compiling_twice_keeps_the_first_accessor() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(1.0));
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::path("prop1.radius");

    rt.compile(&mut ctx, &node, &root).unwrap();
    let first = accessor_of(&node).clone();
    rt.compile(&mut ctx, &node, &root).unwrap();
    assert!(Arc::ptr_eq(&first, accessor_of(&node)));

    let pool = rt.compiler().pools().pool_for(demo.loader.id());
    assert_eq!(pool.defined().len(), 1);
    assert_eq!(&*pool.defined()[0], first.class_name());
}

#[test]
fn constant_without_literal_delegates_to_interpreter() {
    let rt = Runtime::new();
    let node = ast::constant(Value::list(vec![Value::Int(1), Value::Int(2)]));
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), Value::Null);

    rt.compile(&mut ctx, &node, &Value::Null).unwrap();
    let acc = accessor_of(&node);
    assert_eq!(acc.get_source(), "{ return $node.getValue($1, $2);}");
    assert_eq!(acc.set_source(), "{ $node.setValue($1, $2, $3);}");

    let compiled = acc.get(&mut ctx, &Value::Null).unwrap();
    let interpreted = interpreter::get_value(&mut ctx, &node, &Value::Null).unwrap();
    assert_eq!(compiled, interpreted);
    assert!(matches!(acc.set(&mut ctx, &Value::Null, Value::Int(3)), Err(EvalError::NotAssignable(_))));
}

#[test]
fn literal_constant_is_inlined() {
    let rt = Runtime::new();
    let node = ast::constant(5i64);
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), Value::Null);

    rt.compile(&mut ctx, &node, &Value::Null).unwrap();
    let acc = accessor_of(&node);
    assert!(acc.get_source().contains("5L"), "{}", acc.get_source());
    assert_eq!(acc.get(&mut ctx, &Value::Null).unwrap(), Value::Int(5));
}

#[test]
fn root_of_another_class_falls_back_to_interpreter() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(2.0));
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::path("prop1.radius");
    rt.compile(&mut ctx, &node, &root).unwrap();

    let other = Value::map([("prop1", demo.circle(3.0))]);
    let acc = accessor_of(&node);
    assert_eq!(float(&acc.get(&mut ctx, &other).unwrap()), 3.0);
}

#[test]
fn intermediate_of_another_class_falls_back_to_interpreter() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(2.0));
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::path("prop1.radius");
    rt.compile(&mut ctx, &node, &root).unwrap();

    // The cast to Circle fails; the interpreter reports the missing property.
    let with_square = demo.holder(demo.square(2.0));
    let err = accessor_of(&node).get(&mut ctx, &with_square).unwrap_err();
    assert!(matches!(err, EvalError::NoSuchProperty { .. }), "{err}");
}

#[test]
fn dynamic_index_becomes_local_reference() {
    let rt = Runtime::new();
    let root = Value::map([
        ("xs", Value::list(vec![Value::str("a"), Value::str("b"), Value::str("c")])),
        ("i", Value::Int(1)),
    ]);
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), root.clone());
    let node = ast::chain(vec![ast::property("xs"), ast::index(ast::property("i"))]);

    rt.compile(&mut ctx, &node, &root).unwrap();
    let acc = accessor_of(&node);
    assert!(acc.get_source().contains("ref0($$)"), "{}", acc.get_source());
    assert!(acc.set_source().contains("ref1($$)"), "{}", acc.set_source());
    assert_eq!(acc.get(&mut ctx, &root).unwrap(), Value::str("b"));

    if let Value::Map(m) = &root {
        m.write().insert(Arc::from("i"), Value::Int(2));
    }
    assert_eq!(acc.get(&mut ctx, &root).unwrap(), Value::str("c"));

    acc.set(&mut ctx, &root, Value::str("z")).unwrap();
    let Value::List(xs) = interpreter::get_value(&mut ctx, &ast::property("xs"), &root).unwrap() else {
        panic!("xs should be a list");
    };
    assert_eq!(*xs.read(), vec![Value::str("a"), Value::str("b"), Value::str("z")]);
}

#[test]
fn statics_compile_against_the_context_loader() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let mut ctx = demo.context(&rt, Value::Null);

    let field = ast::static_field("demo.Holder", "COUNT");
    rt.compile(&mut ctx, &field, &Value::Null).unwrap();
    assert!(accessor_of(&field).get_source().contains("demo.Holder.COUNT"));
    assert_eq!(rt.get_value(&mut ctx, &field).unwrap(), Value::Int(7));

    let call = ast::static_method("demo.Holder", "twice", vec![ast::constant(21i64)]);
    rt.compile(&mut ctx, &call, &Value::Null).unwrap();
    assert!(accessor_of(&call).get_source().contains("demo.Holder.twice(21L)"));
    assert_eq!(rt.get_value(&mut ctx, &call).unwrap(), Value::Int(42));
}

#[test]
fn variables_read_and_write_the_context() {
    let rt = Runtime::new();
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), Value::Null);
    ctx.set_var("x", Value::Int(3));
    let node = ast::var("x");

    rt.compile(&mut ctx, &node, &Value::Null).unwrap();
    let acc = accessor_of(&node);
    assert_eq!(acc.get(&mut ctx, &Value::Null).unwrap(), Value::Int(3));
    acc.set(&mut ctx, &Value::Null, Value::Int(9)).unwrap();
    assert_eq!(ctx.var("x"), Some(&Value::Int(9)));
}

#[test]
fn null_root_compiles_to_delegating_accessor() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let mut ctx = demo.context(&rt, Value::Null);
    let node = ast::property("label");

    rt.compile(&mut ctx, &node, &Value::Null).unwrap();
    let err = accessor_of(&node).get(&mut ctx, &Value::Null).unwrap_err();
    assert!(matches!(err, EvalError::NullSource(_)), "{err}");
}

struct RefusingBackend;

impl AccessorBackend for RefusingBackend {
    fn define(&self, _pool: &CompilationPool, class: AccessorClass) -> Result<Arc<dyn NodeAccessor>, BackendError> {
        Err(BackendError::Instantiation {
            class: class.name,
            reason: "refused".to_string(),
        })
    }
}

#[test]
fn backend_failure_is_a_compile_error() {
    let demo = Demo::new();
    let rt = Runtime::builder().backend(Arc::new(RefusingBackend)).build();
    let root = demo.holder(demo.circle(1.0));
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::path("prop1.radius");

    let err = rt.compile(&mut ctx, &node, &root).unwrap_err();
    assert!(matches!(err.cause, CompileCause::Backend(_)));
    assert_eq!(err.root, "demo.Holder");
    assert_eq!(err.expression, node.to_string());
    assert!(err.get_source.contains("getRadius"), "{}", err.get_source);
    assert!(node.accessor().is_none());

    // Evaluation still works through the interpreter.
    assert_eq!(float(&rt.get_value(&mut ctx, &node).unwrap()), 1.0);
}

#[test]
fn auto_compile_binds_on_first_evaluation() {
    let demo = Demo::new();
    let config = RuntimeConfig {
        auto_compile: true,
        ..RuntimeConfig::default()
    };
    let rt = Runtime::builder().config(config).build();
    let root = demo.holder(demo.circle(6.0));
    let mut ctx = demo.context(&rt, root);
    let node = ast::path("prop1.area");

    assert!(node.accessor().is_none());
    assert_eq!(float(&rt.get_value(&mut ctx, &node).unwrap()), 108.0);
    assert!(node.accessor().is_some());
    assert_eq!(float(&rt.get_value(&mut ctx, &node).unwrap()), 108.0);
}

#[test]
fn pools_are_shared_per_loader() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(1.0));
    let mut ctx = demo.context(&rt, root.clone());
    for expr in ["prop1", "prop1.radius", "label"] {
        rt.compile(&mut ctx, &ast::path(expr), &root).unwrap();
    }
    let pools = rt.compiler().pools();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools.created(), 1);
    assert_eq!(pools.pool_for(demo.loader.id()).defined().len(), 3);
}

fn same_result(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(_), Value::Object(_)) => a.type_name() == b.type_name(),
        _ => a == b,
    }
}

#[test]
fn compiled_and_interpreted_results_agree() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(2.0));
    let mut ctx = demo.context(&rt, root.clone());

    let expressions = vec![
        ast::path("prop1.radius"),
        ast::path("prop1.area"),
        ast::chain(vec![ast::property("prop1"), ast::method("getArea", vec![])]),
        ast::property("label"),
        ast::and(
            ast::eq(ast::property("label"), ast::constant("h")),
            ast::not(ast::constant(false)),
        ),
        ast::or(ast::constant(false), ast::eq(ast::path("prop1.radius"), ast::constant(2.0))),
        ast::sequence(vec![ast::property("label"), ast::path("prop1.radius")]),
        ast::ctor("demo.Square", vec![]),
        ast::root(),
        ast::this(),
        ast::chain(vec![ast::root(), ast::property("label")]),
    ];
    for make in expressions {
        let interpreted = interpreter::get_value(&mut ctx, &make, &root).unwrap();
        rt.compile(&mut ctx, &make, &root).unwrap();
        let compiled = accessor_of(&make).get(&mut ctx, &root).unwrap();
        assert!(
            same_result(&compiled, &interpreted),
            "{make}: compiled {compiled:?}, interpreted {interpreted:?}\n{}",
            accessor_of(&make).get_source()
        );
    }
}

#[test]
fn array_elements_compile_against_their_component_type() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = Value::array_in(&demo.loader, &demo.circle, vec![demo.circle(1.0), demo.circle(4.0)]);
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::chain(vec![ast::index(ast::constant(1i64)), ast::property("radius")]);

    rt.compile(&mut ctx, &node, &root).unwrap();
    let acc = accessor_of(&node);
    assert!(acc.get_source().contains("[1]"), "{}", acc.get_source());
    assert_eq!(float(&acc.get(&mut ctx, &root).unwrap()), 4.0);

    let length = ast::property("length");
    rt.compile(&mut ctx, &length, &root).unwrap();
    assert!(accessor_of(&length).get_source().contains(".length"));
    assert_eq!(accessor_of(&length).get(&mut ctx, &root).unwrap(), Value::Int(2));
}

/// `demo.Source` with a counting `bump()`, declared to return `Object`,
/// that yields a circle until `maps` is set and a map afterwards.
struct Bumper {
    root: Value,
    calls: Arc<AtomicUsize>,
    maps: Arc<AtomicBool>,
}

impl Bumper {
    fn new(demo: &Demo) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let maps = Arc::new(AtomicBool::new(false));
        let circle = demo.circle(2.0);
        let (c, m) = (calls.clone(), maps.clone());
        let source = ClassBuilder::class("demo.Source")
            .method("bump", &[], &builtins().object, move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
                if m.load(Ordering::SeqCst) {
                    Ok(Value::map([("radius", Value::Float(5.0))]))
                } else {
                    Ok(circle.clone())
                }
            })
            .build(&demo.loader)
            .unwrap();
        Self {
            root: Value::object(Instance::new(&source)),
            calls,
            maps,
        }
    }

    fn switch_to_maps(&self) {
        self.maps.store(true, Ordering::SeqCst);
        self.calls.store(0, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[test]
fn failed_cast_midway_interprets_only_the_failing_hop() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let bumper = Bumper::new(&demo);
    let root = bumper.root.clone();
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::chain(vec![ast::method("bump", vec![]), ast::property("radius")]);

    rt.compile(&mut ctx, &node, &root).unwrap();
    let acc = accessor_of(&node);
    assert!(acc.get_source().contains("((demo.Circle)"), "{}", acc.get_source());

    bumper.switch_to_maps();
    let interpreted = interpreter::get_value(&mut ctx, &node, &root).unwrap();
    assert_eq!(bumper.calls(), 1);

    bumper.switch_to_maps();
    let compiled = acc.get(&mut ctx, &root).unwrap();
    assert_eq!(compiled, interpreted);
    assert_eq!(float(&compiled), 5.0);
    assert_eq!(bumper.calls(), 1);
}

#[test]
fn failed_cast_in_setter_interprets_only_the_last_hop() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let bumper = Bumper::new(&demo);
    let root = bumper.root.clone();
    let mut ctx = demo.context(&rt, root.clone());
    let node = ast::chain(vec![ast::method("bump", vec![]), ast::property("radius")]);

    rt.compile(&mut ctx, &node, &root).unwrap();
    bumper.switch_to_maps();
    accessor_of(&node).set(&mut ctx, &root, Value::Float(8.0)).unwrap();
    assert_eq!(bumper.calls(), 1);
}
