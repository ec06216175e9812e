//! Builtin classes defined by the system loader.

use std::sync::{Arc, OnceLock};

use crate::builder::ClassBuilder;
use crate::class::ClassRef;
use crate::error::InvokeError;
use crate::loader::ClassLoader;
use crate::value::Value;

pub struct Builtins {
    pub loader: Arc<ClassLoader>,
    pub object: ClassRef,
    pub class: ClassRef,
    pub comparable: ClassRef,
    pub number: ClassRef,
    pub boolean: ClassRef,
    pub long: ClassRef,
    pub double: ClassRef,
    pub string: ClassRef,
    pub list: ClassRef,
    pub array_list: ClassRef,
    pub map: ClassRef,
    pub hash_map: ClassRef,
    pub prim_boolean: ClassRef,
    pub prim_long: ClassRef,
    pub prim_double: ClassRef,
    pub prim_void: ClassRef,
    /// `Object[]`, the class every array handler is registered under.
    pub object_array: ClassRef,
}

static BUILTINS: OnceLock<Builtins> = OnceLock::new();

pub fn builtins() -> &'static Builtins {
    BUILTINS.get_or_init(init)
}

fn len_of(this: &Value) -> Result<usize, InvokeError> {
    match this {
        Value::Str(s) => Ok(s.chars().count()),
        Value::List(items) => Ok(items.read().len()),
        Value::Map(map) => Ok(map.read().len()),
        Value::Array(a) => Ok(a.len()),
        other => Err(InvokeError::msg(format!("{} has no length", other.type_name()))),
    }
}

fn init() -> Builtins {
    let loader = ClassLoader::root("system");
    // The system loader never redefines, so these cannot fail.
    let define = |b: ClassBuilder, sup: Option<&ClassRef>| -> ClassRef {
        match b.build_with(&loader, sup.cloned()) {
            Ok(c) => c,
            Err(e) => unreachable!("builtin class definition failed: {e}"),
        }
    };

    let prim_boolean = define(ClassBuilder::primitive("boolean"), None);
    let prim_long = define(ClassBuilder::primitive("long"), None);
    let prim_double = define(ClassBuilder::primitive("double"), None);
    let prim_void = define(ClassBuilder::primitive("void"), None);

    let object = define(
        ClassBuilder::class("Object")
            .method("hashCode", &[], &prim_long, |this, _| {
                Ok(Value::Int(match this {
                    Value::Object(o) => Arc::as_ptr(o) as i64,
                    Value::Int(i) => *i,
                    _ => 0,
                }))
            })
            .constructor(&[], |class, _| {
                Ok(Value::object(crate::value::Instance::new(class)))
            }),
        None,
    );
    let comparable = define(
        ClassBuilder::interface("Comparable").abstract_method("compareTo", &[object.clone()], &prim_long),
        None,
    );
    let string = define(
        ClassBuilder::class("String")
            .implements(&comparable)
            .method("length", &[], &prim_long, |this, _| Ok(Value::Int(len_of(this)? as i64)))
            .method("isEmpty", &[], &prim_boolean, |this, _| Ok(Value::Bool(len_of(this)? == 0))),
        Some(&object),
    );
    let class = define(
        ClassBuilder::class("Class").method("getName", &[], &string, |this, _| match this {
            Value::Class(c) => Ok(Value::str(c.name())),
            other => Err(InvokeError::msg(format!("{} is not a class", other.type_name()))),
        }),
        Some(&object),
    );
    let number = define(
        ClassBuilder::class("Number")
            .method("longValue", &[], &prim_long, |this, _| match this {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) => Ok(Value::Int(*f as i64)),
                other => Err(InvokeError::msg(format!("{} is not a number", other.type_name()))),
            })
            .method("doubleValue", &[], &prim_double, |this, _| match this {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => Ok(Value::Float(*f)),
                other => Err(InvokeError::msg(format!("{} is not a number", other.type_name()))),
            }),
        Some(&object),
    );
    let boolean = define(ClassBuilder::class("Boolean").implements(&comparable), Some(&object));
    let long = define(ClassBuilder::class("Long").implements(&comparable), Some(&number));
    let double = define(ClassBuilder::class("Double").implements(&comparable), Some(&number));

    let list = define(
        ClassBuilder::interface("List")
            .abstract_method("size", &[], &prim_long)
            .abstract_method("isEmpty", &[], &prim_boolean)
            .abstract_method("get", &[prim_long.clone()], &object),
        None,
    );
    let array_list = define(
        ClassBuilder::class("ArrayList")
            .implements(&list)
            .method("size", &[], &prim_long, |this, _| Ok(Value::Int(len_of(this)? as i64)))
            .method("isEmpty", &[], &prim_boolean, |this, _| Ok(Value::Bool(len_of(this)? == 0)))
            .method("get", &[prim_long.clone()], &object, |this, args| match (this, &args[0]) {
                (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                    .ok()
                    .and_then(|i| items.read().get(i).cloned())
                    .ok_or_else(|| InvokeError::msg(format!("index {i} out of bounds"))),
                _ => Err(InvokeError::msg("ArrayList.get expects a list and an index")),
            })
            .constructor(&[], |_, _| Ok(Value::list(Vec::new()))),
        Some(&object),
    );
    let map = define(
        ClassBuilder::interface("Map")
            .abstract_method("size", &[], &prim_long)
            .abstract_method("isEmpty", &[], &prim_boolean)
            .abstract_method("get", &[object.clone()], &object)
            .abstract_method("containsKey", &[object.clone()], &prim_boolean),
        None,
    );
    let hash_map = define(
        ClassBuilder::class("HashMap")
            .implements(&map)
            .method("size", &[], &prim_long, |this, _| Ok(Value::Int(len_of(this)? as i64)))
            .method("isEmpty", &[], &prim_boolean, |this, _| Ok(Value::Bool(len_of(this)? == 0)))
            .method("get", &[object.clone()], &object, |this, args| match (this, &args[0]) {
                (Value::Map(m), Value::Str(k)) => Ok(m.read().get(&**k).cloned().unwrap_or_default()),
                (Value::Map(_), _) => Ok(Value::Null),
                _ => Err(InvokeError::msg("HashMap.get expects a map")),
            })
            .method("containsKey", &[object.clone()], &prim_boolean, |this, args| {
                match (this, &args[0]) {
                    (Value::Map(m), Value::Str(k)) => Ok(Value::Bool(m.read().contains_key(&**k))),
                    _ => Ok(Value::Bool(false)),
                }
            })
            .constructor(&[], |_, _| Ok(Value::map(Vec::<(&str, Value)>::new()))),
        Some(&object),
    );

    let object_array = loader.array_class_with_super(&object, &object);

    Builtins {
        loader,
        object,
        class,
        comparable,
        number,
        boolean,
        long,
        double,
        string,
        list,
        array_list,
        map,
        hash_map,
        prim_boolean,
        prim_long,
        prim_double,
        prim_void,
        object_array,
    }
}
