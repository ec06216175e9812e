//! Object model for the navex expression engine.
//!
//! This crate contains the types expressions navigate, independent of any
//! expression machinery:
//! - `ClassRef` - identity-compared class descriptors with explicit members
//! - `ClassLoader` - class namespaces, the unit accessor pools are keyed by
//! - `Value` - runtime values and shared object graphs
//! - `Builtins` - the system classes every loader inherits

pub mod builder;
pub mod builtins;
pub mod class;
pub mod error;
pub mod loader;
pub mod value;

pub use builder::ClassBuilder;
pub use builtins::{Builtins, builtins};
pub use class::{
    ClassKind, ClassRef, ConstructorInfo, FieldInfo, MethodInfo, NativeConstructor, NativeMethod,
};
pub use error::{ClassError, InvokeError};
pub use loader::{ClassLoader, LoaderId};
pub use value::{ArrayObject, FastHashMap, Instance, ListRef, MapRef, Value, fast_map_new};
