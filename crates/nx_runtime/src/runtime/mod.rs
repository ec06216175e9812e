//! The runtime facade.
//!
//! A `Runtime` owns everything evaluation and compilation share: member
//! metadata, the property and method handler tables, and the expression
//! compiler. It is created once and handed around as `Arc<Runtime>`.

mod config;
mod handlers;
pub mod members;

use std::sync::Arc;

use nx_core::{ClassRef, Value, builtins};

pub use config::RuntimeConfig;
pub use handlers::HandlerTable;
pub use members::MemberCache;

use crate::accessors::{
    ArrayPropertyAccessor, ListPropertyAccessor, MapPropertyAccessor, MethodAccessor, ObjectMethodAccessor,
    ObjectPropertyAccessor, PropertyAccessor, PropertyKey,
};
use crate::ast::Node;
use crate::cache::CacheInspector;
use crate::compiler::{AccessorBackend, ClosureBackend, ExpressionCompiler, PoolRegistry};
use crate::context::EvalContext;
use crate::errors::{CompileError, EvalError};
use crate::interpreter;

pub struct Runtime {
    config: RuntimeConfig,
    members: MemberCache,
    property_accessors: HandlerTable<Arc<dyn PropertyAccessor>>,
    method_accessors: HandlerTable<Arc<dyn MethodAccessor>>,
    compiler: ExpressionCompiler,
}

#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    pools: Option<Arc<PoolRegistry>>,
    backend: Option<Arc<dyn AccessorBackend>>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares a pool registry between runtimes.
    pub fn pools(mut self, pools: Arc<PoolRegistry>) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn AccessorBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Arc<Runtime> {
        let pools = self.pools.unwrap_or_else(|| Arc::new(PoolRegistry::new()));
        let backend = self.backend.unwrap_or_else(|| Arc::new(ClosureBackend));
        let rt = Runtime {
            config: self.config,
            members: MemberCache::new(self.config.cache_strategy),
            property_accessors: HandlerTable::new("property"),
            method_accessors: HandlerTable::new("method"),
            compiler: ExpressionCompiler::new(pools, backend),
        };
        rt.register_defaults();
        Arc::new(rt)
    }
}

impl Runtime {
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    fn register_defaults(&self) {
        let b = builtins();
        self.property_accessors.register(&b.object, Arc::new(ObjectPropertyAccessor));
        self.property_accessors.register(&b.list, Arc::new(ListPropertyAccessor));
        self.property_accessors.register(&b.map, Arc::new(MapPropertyAccessor));
        self.property_accessors.register(&b.object_array, Arc::new(ArrayPropertyAccessor));
        self.method_accessors.register(&b.object, Arc::new(ObjectMethodAccessor));
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn members(&self) -> &MemberCache {
        &self.members
    }

    pub fn compiler(&self) -> &ExpressionCompiler {
        &self.compiler
    }

    pub fn property_handlers(&self) -> &HandlerTable<Arc<dyn PropertyAccessor>> {
        &self.property_accessors
    }

    pub fn method_handlers(&self) -> &HandlerTable<Arc<dyn MethodAccessor>> {
        &self.method_accessors
    }

    pub fn set_property_accessor(&self, class: &ClassRef, accessor: Arc<dyn PropertyAccessor>) {
        self.property_accessors.register(class, accessor);
    }

    pub fn set_method_accessor(&self, class: &ClassRef, accessor: Arc<dyn MethodAccessor>) {
        self.method_accessors.register(class, accessor);
    }

    pub fn property_accessor(&self, class: &ClassRef) -> Result<Arc<dyn PropertyAccessor>, EvalError> {
        self.property_accessors
            .resolve(class)
            .ok_or_else(|| EvalError::NoHandler {
                kind: self.property_accessors.kind(),
                class: class.name().to_string(),
            })
    }

    pub fn method_accessor(&self, class: &ClassRef) -> Result<Arc<dyn MethodAccessor>, EvalError> {
        self.method_accessors
            .resolve(class)
            .ok_or_else(|| EvalError::NoHandler {
                kind: self.method_accessors.kind(),
                class: class.name().to_string(),
            })
    }

    pub fn get_property(&self, ctx: &mut EvalContext, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
        let class = target.class().ok_or_else(|| EvalError::NullSource(key.to_string()))?;
        self.property_accessor(&class)?.get_property(ctx, target, key)
    }

    pub fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), EvalError> {
        let class = target.class().ok_or_else(|| EvalError::NullSource(key.to_string()))?;
        self.property_accessor(&class)?.set_property(ctx, target, key, value)
    }

    pub fn call_method(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let class = target.class().ok_or_else(|| EvalError::NullSource(name.to_string()))?;
        self.method_accessor(&class)?.call_method(ctx, target, name, args)
    }

    pub fn call_static_method(
        &self,
        ctx: &mut EvalContext,
        class: &ClassRef,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        self.method_accessor(class)?.call_static_method(ctx, class, name, args)
    }

    /// Instantiates `class` with the first constructor accepting `args`.
    pub fn construct(&self, class: &ClassRef, args: &[Value]) -> Result<Value, EvalError> {
        let ctor = class
            .constructors()
            .iter()
            .find(|c| c.accepts(args))
            .ok_or_else(|| EvalError::NoSuchConstructor {
                class: class.name().to_string(),
                argc: args.len(),
            })?;
        Ok((ctor.body)(class, args)?)
    }

    /// Evaluates `node` against the context root, through its compiled
    /// accessor when one is bound.
    pub fn get_value(&self, ctx: &mut EvalContext, node: &Arc<Node>) -> Result<Value, EvalError> {
        let root = ctx.root().clone();
        if node.accessor().is_none() && self.config.auto_compile {
            if let Err(e) = self.compiler.compile(ctx, node, &root) {
                tracing::debug!(error = %e, "auto-compilation failed, interpreting");
            }
        }
        match node.accessor() {
            Some(accessor) => accessor.get(ctx, &root),
            None => interpreter::get_value(ctx, node, &root),
        }
    }

    pub fn set_value(&self, ctx: &mut EvalContext, node: &Arc<Node>, value: Value) -> Result<(), EvalError> {
        let root = ctx.root().clone();
        match node.accessor() {
            Some(accessor) => accessor.set(ctx, &root, value),
            None => interpreter::set_value(ctx, node, &root, value),
        }
    }

    pub fn compile(&self, ctx: &mut EvalContext, node: &Arc<Node>, root: &Value) -> Result<(), CompileError> {
        self.compiler.compile(ctx, node, root)
    }

    /// Drops member metadata; handler registrations are kept.
    pub fn clear_cache(&self) {
        self.members.clear();
    }

    /// Installs `inspector` on every class-keyed cache: both handler tables
    /// and the member metadata tables.
    pub fn set_class_cache_inspector(&self, inspector: Option<Arc<dyn CacheInspector>>) {
        self.members.set_inspector(inspector.clone());
        self.property_accessors.set_inspector(inspector.clone());
        self.method_accessors.set_inspector(inspector);
    }
}
