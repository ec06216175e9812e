//! Runtime value representation.
//!
//! Scalars are stored inline; lists, maps, arrays and objects are shared
//! handles with interior mutability so one object graph can be navigated
//! from several threads.

use std::fmt;
use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::builtins::builtins;
use crate::class::{ClassKind, ClassRef};
use crate::loader::ClassLoader;

pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

#[inline]
pub fn fast_map_new<K, V>() -> FastHashMap<K, V> {
    HashMap::with_hasher(RandomState::new())
}

pub type ListRef = Arc<RwLock<Vec<Value>>>;
pub type MapRef = Arc<RwLock<IndexMap<Arc<str>, Value>>>;

pub struct ArrayObject {
    class: ClassRef,
    elems: RwLock<Vec<Value>>,
}

impl ArrayObject {
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.elems.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.elems.read().get(index).cloned()
    }

    /// Stores `value` at `index`; returns false when out of bounds.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.elems.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// An instance of a user-defined class. Fields of the whole superclass
/// chain live in one table, initialized to their type's default.
pub struct Instance {
    class: ClassRef,
    fields: RwLock<IndexMap<Arc<str>, Value>>,
}

impl Instance {
    pub fn new(class: &ClassRef) -> Self {
        let mut chain = Vec::new();
        let mut cur = Some(class);
        while let Some(c) = cur {
            chain.push(c);
            cur = c.superclass();
        }
        let mut fields = IndexMap::new();
        for c in chain.iter().rev() {
            for f in c.declared_fields().iter().filter(|f| !f.is_static) {
                fields.insert(f.name.clone(), Value::default_for(&f.ty));
            }
        }
        Self {
            class: class.clone(),
            fields: RwLock::new(fields),
        }
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Writes a declared field; returns false if the class has no such field.
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.fields.write().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(ListRef),
    Map(MapRef),
    Array(Arc<ArrayObject>),
    Object(Arc<Instance>),
    Class(ClassRef),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (Arc::from(k.as_ref()), v))
            .collect::<IndexMap<_, _>>();
        Value::Map(Arc::new(RwLock::new(map)))
    }

    /// Array whose class is the system array class of `component`.
    pub fn array(component: &ClassRef, elems: Vec<Value>) -> Self {
        Self::array_in(ClassLoader::system(), component, elems)
    }

    pub fn array_in(loader: &ClassLoader, component: &ClassRef, elems: Vec<Value>) -> Self {
        Value::Array(Arc::new(ArrayObject {
            class: loader.array_class(component),
            elems: RwLock::new(elems),
        }))
    }

    pub fn object(instance: Instance) -> Self {
        Value::Object(Arc::new(instance))
    }

    /// Zero value for a slot of type `ty`: 0 / 0.0 / false for primitives,
    /// null for everything else.
    pub fn default_for(ty: &ClassRef) -> Self {
        if ty.kind() != ClassKind::Primitive {
            return Value::Null;
        }
        match ty.name() {
            "long" => Value::Int(0),
            "double" => Value::Float(0.0),
            "boolean" => Value::Bool(false),
            _ => Value::Null,
        }
    }

    /// Runtime class of the value; `None` for null.
    pub fn class(&self) -> Option<ClassRef> {
        let b = builtins();
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => b.boolean.clone(),
            Value::Int(_) => b.long.clone(),
            Value::Float(_) => b.double.clone(),
            Value::Str(_) => b.string.clone(),
            Value::List(_) => b.array_list.clone(),
            Value::Map(_) => b.hash_map.clone(),
            Value::Array(a) => a.class.clone(),
            Value::Object(o) => o.class.clone(),
            Value::Class(_) => b.class.clone(),
        })
    }

    pub fn type_name(&self) -> String {
        match self.class() {
            Some(c) => c.name().to_string(),
            None => "null".to_string(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    /// Scalars and strings compare by value, everything else by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
            Value::Array(a) => write!(f, "{}@{:x}", a.class.name(), Arc::as_ptr(a) as usize),
            Value::Object(o) => write!(f, "{}@{:x}", o.class.name(), Arc::as_ptr(o) as usize),
            Value::Class(c) => write!(f, "class {}", c.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}
