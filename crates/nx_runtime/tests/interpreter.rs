mod common;

use nx_core::Value;
use nx_runtime::ast;
use nx_runtime::errors::{EvalError, messages};
use nx_runtime::{Runtime, interpreter};

use common::{Demo, float};

#[test]
fn property_chains_follow_getters_and_fields() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.circle(1.5));
    let mut ctx = demo.context(&rt, root.clone());

    assert_eq!(float(&rt.get_value(&mut ctx, &ast::path("prop1.radius")).unwrap()), 1.5);
    assert_eq!(rt.get_value(&mut ctx, &ast::path("label")).unwrap(), Value::str("h"));

    rt.set_value(&mut ctx, &ast::path("label"), Value::str("renamed")).unwrap();
    assert_eq!(rt.get_value(&mut ctx, &ast::path("label")).unwrap(), Value::str("renamed"));

    let err = rt.get_value(&mut ctx, &ast::path("prop1.missing")).unwrap_err();
    assert!(matches!(err, EvalError::NoSuchProperty { .. }), "{err}");
}

#[test]
fn methods_dispatch_on_the_runtime_class() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(demo.square(3.0));
    let mut ctx = demo.context(&rt, root);
    let area = ast::chain(vec![ast::property("prop1"), ast::method("getArea", vec![])]);
    assert_eq!(float(&rt.get_value(&mut ctx, &area).unwrap()), 9.0);

    let missing = ast::method("getArea", vec![ast::constant(1i64)]);
    let err = rt.get_value(&mut ctx, &missing).unwrap_err();
    assert!(matches!(err, EvalError::NoSuchMethod { argc: 1, .. }), "{err}");
}

#[test]
fn maps_read_missing_keys_as_null() {
    let rt = Runtime::new();
    let root = Value::map([("a", Value::Int(1))]);
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), root.clone());

    assert_eq!(rt.get_value(&mut ctx, &ast::property("a")).unwrap(), Value::Int(1));
    assert_eq!(rt.get_value(&mut ctx, &ast::property("b")).unwrap(), Value::Null);
    assert_eq!(rt.get_value(&mut ctx, &ast::property("size")).unwrap(), Value::Int(1));

    rt.set_value(&mut ctx, &ast::property("b"), Value::Int(2)).unwrap();
    assert_eq!(rt.get_value(&mut ctx, &ast::property("size")).unwrap(), Value::Int(2));
}

#[test]
fn list_indices_are_bounds_checked() {
    let rt = Runtime::new();
    let root = Value::list(vec![Value::Int(10), Value::Int(20)]);
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), root);

    assert_eq!(rt.get_value(&mut ctx, &ast::index(ast::constant(1i64))).unwrap(), Value::Int(20));
    assert_eq!(rt.get_value(&mut ctx, &ast::property("size")).unwrap(), Value::Int(2));
    let err = rt.get_value(&mut ctx, &ast::index(ast::constant(2i64))).unwrap_err();
    assert!(matches!(err, EvalError::IndexOutOfBounds { index: 2, len: 2 }), "{err}");
    let err = rt.get_value(&mut ctx, &ast::index(ast::constant(-1i64))).unwrap_err();
    assert!(matches!(err, EvalError::IndexOutOfBounds { .. }), "{err}");
}

#[test]
fn arrays_check_component_types_on_store() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = Value::array_in(&demo.loader, &demo.shape, vec![demo.circle(1.0), demo.square(2.0)]);
    let mut ctx = demo.context(&rt, root.clone());

    assert_eq!(rt.get_value(&mut ctx, &ast::property("length")).unwrap(), Value::Int(2));
    let second = ast::chain(vec![ast::index(ast::constant(1i64)), ast::property("area")]);
    assert_eq!(float(&rt.get_value(&mut ctx, &second).unwrap()), 4.0);

    rt.set_value(&mut ctx, &ast::index(ast::constant(0i64)), demo.square(5.0)).unwrap();
    let first = ast::chain(vec![ast::index(ast::constant(0i64)), ast::property("area")]);
    assert_eq!(float(&rt.get_value(&mut ctx, &first).unwrap()), 25.0);

    let err = rt
        .set_value(&mut ctx, &ast::index(ast::constant(0i64)), Value::str("nope"))
        .unwrap_err();
    assert!(matches!(err, EvalError::Incompatible { .. }), "{err}");
    let err = rt.set_value(&mut ctx, &ast::property("length"), Value::Int(1)).unwrap_err();
    assert!(matches!(err, EvalError::ReadOnly { .. }), "{err}");
}

#[test]
fn logic_and_sequences() {
    let rt = Runtime::new();
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), Value::map([("on", Value::Bool(true))]));

    let on = ast::property("on");
    let both = ast::and(on.clone(), ast::not(ast::constant(false)));
    assert_eq!(rt.get_value(&mut ctx, &both).unwrap(), Value::Bool(true));
    let either = ast::or(ast::constant(false), ast::null());
    assert_eq!(rt.get_value(&mut ctx, &either).unwrap(), Value::Bool(false));
    let same = ast::eq(ast::constant(2i64), ast::constant(2.0));
    assert_eq!(rt.get_value(&mut ctx, &same).unwrap(), Value::Bool(true));

    let seq = ast::sequence(vec![ast::constant(1i64), ast::constant("last")]);
    assert_eq!(rt.get_value(&mut ctx, &seq).unwrap(), Value::str("last"));
    assert_eq!(rt.get_value(&mut ctx, &ast::sequence(vec![])).unwrap(), Value::Null);
}

#[test]
fn variables_default_to_null() {
    let rt = Runtime::new();
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), Value::Null);
    assert_eq!(rt.get_value(&mut ctx, &ast::var("unset")).unwrap(), Value::Null);
    rt.set_value(&mut ctx, &ast::var("unset"), Value::Int(1)).unwrap();
    assert_eq!(ctx.var("unset"), Some(&Value::Int(1)));
}

#[test]
fn constructors_and_statics() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let mut ctx = demo.context(&rt, Value::Null);

    let made = rt.get_value(&mut ctx, &ast::ctor("demo.Circle", vec![])).unwrap();
    assert_eq!(made.type_name(), "demo.Circle");
    let err = rt
        .get_value(&mut ctx, &ast::ctor("demo.Circle", vec![ast::constant(1i64)]))
        .unwrap_err();
    assert!(matches!(err, EvalError::NoSuchConstructor { argc: 1, .. }), "{err}");

    let count = ast::static_field("demo.Holder", "COUNT");
    rt.set_value(&mut ctx, &count, Value::Int(8)).unwrap();
    assert_eq!(rt.get_value(&mut ctx, &count).unwrap(), Value::Int(8));

    let err = rt.get_value(&mut ctx, &ast::static_field("demo.Nope", "X")).unwrap_err();
    assert!(matches!(err, EvalError::UnknownClass(_)), "{err}");
}

#[test]
fn non_assignable_expressions_are_rejected() {
    let rt = Runtime::new();
    let mut ctx = nx_runtime::EvalContext::new(rt.clone(), Value::Null);

    match interpreter::set_value(&mut ctx, &ast::constant(1i64), &Value::Null, Value::Int(2)) {
        Err(EvalError::NotAssignable(msg)) => assert_eq!(msg, messages::CONSTANT_NOT_ASSIGNABLE),
        other => panic!("unexpected {other:?}"),
    }
    match interpreter::set_value(&mut ctx, &ast::not(ast::constant(true)), &Value::Null, Value::Int(2)) {
        Err(EvalError::NotAssignable(msg)) => assert_eq!(msg, messages::NOT_ASSIGNABLE),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn null_targets_are_reported() {
    let demo = Demo::new();
    let rt = Runtime::new();
    let root = demo.holder(Value::Null);
    let mut ctx = demo.context(&rt, root);
    let err = rt.get_value(&mut ctx, &ast::path("prop1.radius")).unwrap_err();
    assert!(matches!(err, EvalError::NullSource(ref name) if name == "radius"), "{err}");
}
