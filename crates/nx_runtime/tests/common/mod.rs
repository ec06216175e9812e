#![allow(dead_code)]

use std::sync::Arc;

use nx_core::{ClassBuilder, ClassLoader, ClassRef, Instance, InvokeError, Value, builtins};
use nx_runtime::{EvalContext, Runtime};

/// `demo.Shape`, `demo.Circle implements Shape`, `demo.Square implements Shape`
/// and `demo.Holder { Shape prop1 }`, defined in a loader of their own.
pub struct Demo {
    pub loader: Arc<ClassLoader>,
    pub shape: ClassRef,
    pub circle: ClassRef,
    pub square: ClassRef,
    pub holder: ClassRef,
}

fn field_of(this: &Value, name: &str) -> Result<Value, InvokeError> {
    this.as_object()
        .and_then(|o| o.get_field(name))
        .ok_or_else(|| InvokeError::msg(format!("no field {name} on {}", this.type_name())))
}

fn store(this: &Value, name: &str, value: &Value) -> Result<Value, InvokeError> {
    match this.as_object() {
        Some(o) if o.set_field(name, value.clone()) => Ok(Value::Null),
        _ => Err(InvokeError::msg(format!("no field {name} on {}", this.type_name()))),
    }
}

impl Demo {
    pub fn new() -> Self {
        let b = builtins();
        let loader = ClassLoader::new("demo");
        let shape = ClassBuilder::interface("demo.Shape")
            .abstract_method("getArea", &[], &b.prim_double)
            .build(&loader)
            .unwrap();
        let circle = ClassBuilder::class("demo.Circle")
            .implements(&shape)
            .private_field("radius", &b.prim_double)
            .method("getRadius", &[], &b.prim_double, |this, _| field_of(this, "radius"))
            .method("setRadius", &[b.prim_double.clone()], &b.prim_void, |this, args| {
                store(this, "radius", &args[0])
            })
            .method("getArea", &[], &b.prim_double, |this, _| match field_of(this, "radius")? {
                Value::Float(r) => Ok(Value::Float(3.0 * r * r)),
                other => Err(InvokeError::msg(format!("bad radius {other}"))),
            })
            .default_constructor()
            .build(&loader)
            .unwrap();
        let square = ClassBuilder::class("demo.Square")
            .implements(&shape)
            .field("side", &b.prim_double)
            .method("getArea", &[], &b.prim_double, |this, _| match field_of(this, "side")? {
                Value::Float(s) => Ok(Value::Float(s * s)),
                other => Err(InvokeError::msg(format!("bad side {other}"))),
            })
            .default_constructor()
            .build(&loader)
            .unwrap();
        let holder = ClassBuilder::class("demo.Holder")
            .private_field("prop1", &shape)
            .field("label", &b.string)
            .method("getProp1", &[], &shape, |this, _| field_of(this, "prop1"))
            .method("setProp1", &[shape.clone()], &b.prim_void, |this, args| {
                store(this, "prop1", &args[0])
            })
            .static_field("COUNT", &b.prim_long, Value::Int(7))
            .static_method("twice", &[b.prim_long.clone()], &b.prim_long, |_, args| match &args[0] {
                Value::Int(i) => Ok(Value::Int(i * 2)),
                other => Err(InvokeError::msg(format!("not a long: {other}"))),
            })
            .default_constructor()
            .build(&loader)
            .unwrap();
        Self {
            loader,
            shape,
            circle,
            square,
            holder,
        }
    }

    pub fn circle(&self, radius: f64) -> Value {
        let c = Instance::new(&self.circle);
        assert!(c.set_field("radius", Value::Float(radius)));
        Value::object(c)
    }

    pub fn square(&self, side: f64) -> Value {
        let s = Instance::new(&self.square);
        assert!(s.set_field("side", Value::Float(side)));
        Value::object(s)
    }

    pub fn holder(&self, prop1: Value) -> Value {
        let h = Instance::new(&self.holder);
        assert!(h.set_field("prop1", prop1));
        assert!(h.set_field("label", Value::str("h")));
        Value::object(h)
    }

    pub fn context(&self, rt: &Arc<Runtime>, root: Value) -> EvalContext {
        EvalContext::new(rt.clone(), root).with_loader(self.loader.clone())
    }
}

pub fn float(v: &Value) -> f64 {
    match v {
        Value::Float(f) => *f,
        other => panic!("expected a double, got {other:?}"),
    }
}
