//! Runtime class descriptors.
//!
//! A `ClassRef` is the unit of identity for every class-keyed cache: two
//! classes with the same name defined by different loaders never compare
//! equal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::builtins::builtins;
use crate::error::InvokeError;
use crate::loader::LoaderId;
use crate::value::Value;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_class_id() -> u64 {
    NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Primitive,
    Array,
}

/// Native body of an instance or static method. Static methods receive
/// `Value::Null` as `this`.
pub type NativeMethod = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, InvokeError> + Send + Sync>;

/// Native body of a constructor; receives the class being instantiated.
pub type NativeConstructor =
    Arc<dyn Fn(&ClassRef, &[Value]) -> Result<Value, InvokeError> + Send + Sync>;

#[derive(Clone)]
pub struct FieldInfo {
    pub name: Arc<str>,
    pub ty: ClassRef,
    pub is_static: bool,
    pub is_public: bool,
}

#[derive(Clone)]
pub struct MethodInfo {
    pub name: Arc<str>,
    pub params: Vec<ClassRef>,
    pub ret: ClassRef,
    pub is_static: bool,
    pub is_public: bool,
    /// `None` for abstract and interface methods.
    pub body: Option<NativeMethod>,
}

impl MethodInfo {
    pub fn is_abstract(&self) -> bool {
        self.body.is_none()
    }

    /// Same name and parameter classes; used to collapse overrides.
    pub fn same_signature(&self, other: &MethodInfo) -> bool {
        self.name == other.name && self.params == other.params
    }

    /// Whether `args` can be passed to this method without conversion.
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(p, a)| (a.is_null() && !p.is_primitive()) || p.is_instance(a))
    }

    pub fn invoke(&self, this: &Value, args: &[Value]) -> Result<Value, InvokeError> {
        if args.len() != self.params.len() {
            return Err(InvokeError::ArgumentCount {
                method: self.name.to_string(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        match &self.body {
            Some(body) => body(this, args),
            None => Err(InvokeError::Abstract(self.name.to_string())),
        }
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        write!(f, "{} {}({})", self.ret.name(), self.name, params.join(", "))
    }
}

#[derive(Clone)]
pub struct ConstructorInfo {
    pub params: Vec<ClassRef>,
    pub body: NativeConstructor,
}

impl ConstructorInfo {
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(p, a)| (a.is_null() && !p.is_primitive()) || p.is_instance(a))
    }
}

pub struct ClassInfo {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) kind: ClassKind,
    pub(crate) superclass: Option<ClassRef>,
    pub(crate) interfaces: Vec<ClassRef>,
    pub(crate) component: Option<ClassRef>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) constructors: Vec<ConstructorInfo>,
    pub(crate) statics: RwLock<IndexMap<Arc<str>, Value>>,
    pub(crate) loader: LoaderId,
    pub(crate) reloadable: bool,
}

/// Shared, identity-compared handle to a class.
#[derive(Clone)]
pub struct ClassRef(pub(crate) Arc<ClassInfo>);

impl ClassRef {
    pub(crate) fn from_info(info: ClassInfo) -> Self {
        ClassRef(Arc::new(info))
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Stable hash of the class identity, independent of its name.
    #[inline]
    pub fn identity_hash(&self) -> u32 {
        (self.0.id.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32) as u32
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ClassRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Name without the dotted package prefix.
    pub fn simple_name(&self) -> &str {
        self.0.name.rsplit('.').next().unwrap_or(&self.0.name)
    }

    pub fn kind(&self) -> ClassKind {
        self.0.kind
    }

    pub fn is_interface(&self) -> bool {
        self.0.kind == ClassKind::Interface
    }

    pub fn is_array(&self) -> bool {
        self.0.kind == ClassKind::Array
    }

    pub fn is_primitive(&self) -> bool {
        self.0.kind == ClassKind::Primitive
    }

    pub fn superclass(&self) -> Option<&ClassRef> {
        self.0.superclass.as_ref()
    }

    /// Directly declared interfaces, in declaration order.
    pub fn interfaces(&self) -> &[ClassRef] {
        &self.0.interfaces
    }

    pub fn component(&self) -> Option<&ClassRef> {
        self.0.component.as_ref()
    }

    /// Innermost element class of an array class (the class itself otherwise).
    pub fn element(&self) -> &ClassRef {
        let mut cur = self;
        while let Some(c) = cur.component() {
            cur = c;
        }
        cur
    }

    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut cur = self;
        while let Some(c) = cur.component() {
            dims += 1;
            cur = c;
        }
        dims
    }

    pub fn declared_fields(&self) -> &[FieldInfo] {
        &self.0.fields
    }

    pub fn declared_methods(&self) -> &[MethodInfo] {
        &self.0.methods
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.0.constructors
    }

    pub fn loader_id(&self) -> LoaderId {
        self.0.loader
    }

    /// Whether the defining loader allows this class to be replaced.
    pub fn is_reloadable(&self) -> bool {
        self.0.reloadable
    }

    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.0.statics.read().get(name).cloned()
    }

    /// Writes a declared static field; returns false if there is none.
    pub fn set_static(&self, name: &str, value: Value) -> bool {
        match self.0.statics.write().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Whether a value of class `other` can be stored in a slot of this class.
    pub fn is_assignable_from(&self, other: &ClassRef) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.is_primitive() || other.is_primitive() {
            return false;
        }
        if self.ptr_eq(&builtins().object) {
            return true;
        }
        if let (Some(mine), Some(theirs)) = (self.component(), other.component()) {
            return !mine.is_primitive() && mine.is_assignable_from(theirs);
        }
        if let Some(sup) = other.superclass() {
            if self.is_assignable_from(sup) {
                return true;
            }
        }
        other.interfaces().iter().any(|i| self.is_assignable_from(i))
    }

    pub fn is_instance(&self, value: &Value) -> bool {
        match value.class() {
            Some(c) => self.boxed().is_assignable_from(&c),
            None => false,
        }
    }

    /// Wrapper class for primitives, the class itself otherwise.
    pub fn boxed(&self) -> ClassRef {
        if !self.is_primitive() {
            return self.clone();
        }
        let b = builtins();
        if self.ptr_eq(&b.prim_long) {
            b.long.clone()
        } else if self.ptr_eq(&b.prim_double) {
            b.double.clone()
        } else if self.ptr_eq(&b.prim_boolean) {
            b.boolean.clone()
        } else {
            b.object.clone()
        }
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.name, self.0.id)
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}
