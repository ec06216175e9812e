//! Property and method handlers.
//!
//! The runtime resolves one handler per class through its handler tables.
//! A handler both performs the access when interpreting and, when asked,
//! produces the source fragment the compiler splices into an accessor.

mod array;
mod list;
mod map;
mod method;
mod object;

use std::fmt;
use std::sync::Arc;

use nx_core::{ClassRef, Value};

pub use array::ArrayPropertyAccessor;
pub use list::ListPropertyAccessor;
pub use map::MapPropertyAccessor;
pub use method::ObjectMethodAccessor;
pub use object::ObjectPropertyAccessor;

use crate::compiler::{CompilationContext, Fragment, SetFragment};
use crate::context::EvalContext;
use crate::errors::{EvalError, SourceError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(Arc<str>),
    Index(i64),
}

impl PropertyKey {
    pub fn name(name: &str) -> Self {
        PropertyKey::Name(Arc::from(name))
    }

    pub fn from_value(value: &Value) -> Result<Self, EvalError> {
        match value {
            Value::Int(i) => Ok(PropertyKey::Index(*i)),
            Value::Float(x) if x.fract() == 0.0 => Ok(PropertyKey::Index(*x as i64)),
            Value::Str(s) => Ok(PropertyKey::Name(s.clone())),
            other => Err(EvalError::InvalidKey {
                class: other.type_name(),
                key: other.to_string(),
            }),
        }
    }

    /// Key as a name; indexes are stringified.
    pub fn as_name(&self) -> Arc<str> {
        match self {
            PropertyKey::Name(n) => n.clone(),
            PropertyKey::Index(i) => Arc::from(i.to_string()),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(n) => f.write_str(n),
            PropertyKey::Index(i) => write!(f, "{i}"),
        }
    }
}

/// How a property key reaches generated code.
#[derive(Clone)]
pub enum KeySource {
    Const(PropertyKey),
    /// Computed at run time by `fragment`; `sample` is its value at compile time.
    Dynamic { fragment: Fragment, sample: PropertyKey },
}

impl KeySource {
    pub fn sample(&self) -> &PropertyKey {
        match self {
            KeySource::Const(k) => k,
            KeySource::Dynamic { sample, .. } => sample,
        }
    }
}

pub trait PropertyAccessor: Send + Sync {
    fn get_property(&self, ctx: &mut EvalContext, target: &Value, key: &PropertyKey) -> Result<Value, EvalError>;

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), EvalError>;

    fn source_accessor(
        &self,
        _cc: &mut CompilationContext<'_>,
        target: &Value,
        _key: &KeySource,
    ) -> Result<Fragment, SourceError> {
        Err(SourceError::unsupported(format!(
            "no getter source for {}",
            target.type_name()
        )))
    }

    fn source_setter(
        &self,
        _cc: &mut CompilationContext<'_>,
        target: &Value,
        _key: &KeySource,
    ) -> Result<SetFragment, SourceError> {
        Err(SourceError::unsupported(format!(
            "no setter source for {}",
            target.type_name()
        )))
    }
}

pub trait MethodAccessor: Send + Sync {
    fn call_method(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError>;

    fn call_static_method(
        &self,
        ctx: &mut EvalContext,
        class: &ClassRef,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError>;

    fn source_call(
        &self,
        _cc: &mut CompilationContext<'_>,
        target: &Value,
        name: &str,
        _args: &[Fragment],
        _samples: &[Value],
    ) -> Result<Fragment, SourceError> {
        Err(SourceError::unsupported(format!(
            "no call source for {}.{name}",
            target.type_name()
        )))
    }
}

/// Converts `index` into a position within `len` elements.
pub(crate) fn checked_index(index: i64, len: usize) -> Result<usize, EvalError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(EvalError::IndexOutOfBounds { index, len })
}

/// Source text of a computed key; indexes are unboxed.
pub(crate) fn dynamic_key_source(fragment: &Fragment, sample: &PropertyKey) -> String {
    match sample {
        PropertyKey::Index(_) => format!("{}.intValue()", fragment.source),
        PropertyKey::Name(_) => fragment.source.clone(),
    }
}
