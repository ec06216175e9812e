//! Expression compilation.
//!
//! Compiling a node generates an accessor class with a getter and a setter
//! specialized for the root it was compiled against, hands it to the
//! backend and binds the result to the node. A getter or setter whose
//! source cannot be generated delegates to the interpreter instead; only
//! backend failures and metadata errors abort compilation.

mod backend;
mod context;
mod fragment;
mod local_ref;
mod pool;
mod source;

use std::sync::Arc;

use nx_core::{ClassRef, Value, builtins};

pub use backend::{AccessorBackend, AccessorClass, ClosureBackend, GeneratedMethod, NodeAccessor, validate_source};
pub use context::{CompilationContext, SavedTypes, TypeFrame, cast_expression, cast_string};
pub use fragment::{
    Fragment, Frame, GetCode, SetCode, SetFragment, check_cast, get_code, guard, guard_set, literal_source, set_code,
    then, then_set,
};
pub use local_ref::{LocalMethod, LocalReference, LocalReferenceTable};
pub use pool::{CompilationPool, PoolRegistry};
pub use source::{compile_operand, get_source, needs_target, set_source, target_expression};

use crate::ast::{Node, NodeRef};
use crate::context::EvalContext;
use crate::errors::{CompileCause, CompileError, EvalError, SourceError, messages};
use crate::interpreter;

const GETTER_SIGNATURE: &str = "public Object get(Context $1, Object $2)";
const SETTER_SIGNATURE: &str = "public void set(Context $1, Object $2, Object $3)";

pub struct ExpressionCompiler {
    pools: Arc<PoolRegistry>,
    backend: Arc<dyn AccessorBackend>,
}

/// Values of unknown, primitive or `Object` static type are boxed on return.
fn needs_boxing(ty: Option<&ClassRef>) -> bool {
    ty.is_none_or(|t| t.is_primitive() || t.ptr_eq(&builtins().object))
}

fn generate_getter(
    cc: &mut CompilationContext<'_>,
    node: &NodeRef,
    root: &Value,
) -> Result<GeneratedMethod<GetCode>, SourceError> {
    let frag = get_source(cc, node, root)?;
    let cast = cc.take_pre_cast();
    let (pre, post) = if needs_boxing(cc.current_type()) { (" ($w) (", ")") } else { ("", "") };
    let (root_expr, code) = if needs_target(node) {
        let class = root
            .class()
            .ok_or_else(|| SourceError::unsupported(messages::NULL_TARGET))?;
        (target_expression(&class), guard(class, frag.code, node))
    } else {
        (String::new(), frag.code)
    };
    let source = match &frag.ordered {
        Some((core, last)) => format!("{{ {core} return {pre}{last}{post};}}"),
        None => format!("{{ return {pre}{cast}{root_expr}{}{post};}}", frag.source),
    };
    Ok(GeneratedMethod {
        signature: GETTER_SIGNATURE.to_string(),
        source,
        code,
    })
}

fn generate_setter(
    cc: &mut CompilationContext<'_>,
    node: &NodeRef,
    root: &Value,
) -> Result<GeneratedMethod<SetCode>, SourceError> {
    cc.reset();
    let frag = set_source(cc, node, root)?;
    if frag.source.trim().is_empty() {
        return Err(SourceError::unsupported(messages::NULL_SETTER_BODY));
    }
    if root.is_null() {
        return Err(SourceError::unsupported(messages::NULL_ROOT_SETTER));
    }
    let cast = cc.take_pre_cast();
    let (root_expr, code) = match root.class().filter(|_| needs_target(node)) {
        Some(class) => (target_expression(&class), guard_set(class, frag.code, node)),
        None => (String::new(), frag.code),
    };
    Ok(GeneratedMethod {
        signature: SETTER_SIGNATURE.to_string(),
        source: format!("{{ {cast}{root_expr}{};}}", frag.source),
        code,
    })
}

fn delegated_getter(node: &NodeRef) -> GeneratedMethod<GetCode> {
    let weak = Arc::downgrade(node);
    GeneratedMethod {
        signature: GETTER_SIGNATURE.to_string(),
        source: "{ return $node.getValue($1, $2);}".to_string(),
        code: get_code(move |frame, target| {
            let node = weak.upgrade().ok_or(EvalError::Detached)?;
            interpreter::get_value(frame.ctx(), &node, target)
        }),
    }
}

fn delegated_setter(node: &NodeRef) -> GeneratedMethod<SetCode> {
    let weak = Arc::downgrade(node);
    GeneratedMethod {
        signature: SETTER_SIGNATURE.to_string(),
        source: "{ $node.setValue($1, $2, $3);}".to_string(),
        code: set_code(move |frame, target, value| {
            let node = weak.upgrade().ok_or(EvalError::Detached)?;
            interpreter::set_value(frame.ctx(), &node, target, value)
        }),
    }
}

impl ExpressionCompiler {
    pub fn new(pools: Arc<PoolRegistry>, backend: Arc<dyn AccessorBackend>) -> Self {
        Self { pools, backend }
    }

    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    /// Binds a compiled accessor to `node`. Does nothing if one is already
    /// bound; if another thread binds one first, ours is discarded.
    pub fn compile(&self, ctx: &mut EvalContext, node: &NodeRef, root: &Value) -> Result<(), CompileError> {
        if node.accessor().is_some() {
            return Ok(());
        }
        let pool = self.pools.pool_for(ctx.loader().id());
        let name = pool.next_class_name(node.kind_name());

        let previous_root = ctx.root().clone();
        ctx.set_root(root.clone());
        let result = self.generate(ctx, node, root, name);
        ctx.set_root(previous_root);
        let class = result?;

        let class_name = class.name.clone();
        let delegates = class.delegates;
        let (get_source, set_source) = (class.getter.source.clone(), class.setter.source.clone());
        let accessor = self
            .backend
            .define(&pool, class)
            .map_err(|e| failure(node, root, get_source.clone(), set_source.clone(), e.into()))?;

        if node.set_accessor(accessor) {
            tracing::debug!(
                class = %class_name,
                expression = %node,
                delegates,
                get = %get_source,
                set = %set_source,
                "defined accessor"
            );
        } else {
            tracing::trace!(class = %class_name, "node already bound, discarding accessor");
        }
        Ok(())
    }

    fn generate(
        &self,
        ctx: &mut EvalContext,
        node: &NodeRef,
        root: &Value,
        name: String,
    ) -> Result<AccessorClass, CompileError> {
        let mut cc = CompilationContext::new(ctx, root.clone());
        let mut delegates = false;

        let getter = match generate_getter(&mut cc, node, root) {
            Ok(m) => m,
            Err(SourceError::Unsupported(reason)) => {
                tracing::trace!(expression = %node, %reason, "getter delegates to interpreter");
                delegates = true;
                delegated_getter(node)
            }
            Err(SourceError::Eval(e)) => {
                return Err(failure(node, root, String::new(), String::new(), e.into()));
            }
        };
        let type_trace = cc.take_type_stack();
        let mut locals = cc.local_refs().drain_methods();

        let setter = match generate_setter(&mut cc, node, root) {
            Ok(m) => m,
            Err(SourceError::Unsupported(reason)) => {
                tracing::trace!(expression = %node, %reason, "setter delegates to interpreter");
                delegates = true;
                delegated_setter(node)
            }
            Err(SourceError::Eval(e)) => {
                return Err(failure(node, root, getter.source, String::new(), e.into()));
            }
        };
        locals.extend(cc.local_refs().drain_methods());

        Ok(AccessorClass {
            name,
            getter,
            setter,
            locals,
            node: Arc::downgrade(node),
            delegates,
            type_trace,
        })
    }
}

fn failure(node: &Node, root: &Value, get_source: String, set_source: String, cause: CompileCause) -> CompileError {
    let err = CompileError {
        root: root.type_name(),
        expression: node.to_string(),
        get_source,
        set_source,
        cause,
    };
    tracing::warn!(
        expression = %err.expression,
        root = %err.root,
        get = %err.get_source,
        set = %err.set_source,
        error = %err.cause,
        "accessor compilation failed"
    );
    err
}
