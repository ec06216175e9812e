//! Navex expression runtime.
//!
//! Evaluates expression trees against object graphs from `nx_core`, either
//! by interpretation or through accessors compiled for a specific root.

#![allow(clippy::collapsible_if)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::len_zero)]
#![allow(clippy::needless_borrow)]
#![allow(clippy::unnecessary_map_or)]

pub mod accessors;
pub mod ast;
pub mod cache;
pub mod compiler;
pub mod context;
pub mod errors;
pub mod interpreter;
pub mod resolver;
pub mod runtime;

pub use accessors::{KeySource, MethodAccessor, PropertyAccessor, PropertyKey};
pub use ast::{Node, NodeKind, NodeRef};
pub use cache::{CacheInspector, CacheStrategy, ClassCache, KeyedCache};
pub use compiler::{AccessorBackend, ClosureBackend, ExpressionCompiler, NodeAccessor, PoolRegistry};
pub use context::EvalContext;
pub use errors::{BackendError, CacheError, CompileCause, CompileError, EvalError, SourceError};
pub use resolver::{HierarchyResolver, ResolveStats};
pub use runtime::{MemberCache, Runtime, RuntimeBuilder, RuntimeConfig};
