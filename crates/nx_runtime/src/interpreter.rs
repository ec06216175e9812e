//! Tree-walking evaluation.
//!
//! This is the reference semantics every compiled accessor must agree with,
//! and what accessors fall back to when code generation gives up.

use nx_core::Value;
use smallvec::SmallVec;

use crate::accessors::PropertyKey;
use crate::ast::{Node, NodeKind, NodeRef};
use crate::context::EvalContext;
use crate::errors::{EvalError, messages};

type Args = SmallVec<[Value; 4]>;

/// Index keys and call arguments always evaluate against the root.
fn eval_args(ctx: &mut EvalContext, args: &[NodeRef]) -> Result<Args, EvalError> {
    let root = ctx.root().clone();
    args.iter().map(|a| get_value(ctx, a, &root)).collect()
}

fn eval_key(ctx: &mut EvalContext, key: &Node) -> Result<PropertyKey, EvalError> {
    let root = ctx.root().clone();
    PropertyKey::from_value(&get_value(ctx, key, &root)?)
}

pub fn get_value(ctx: &mut EvalContext, node: &Node, source: &Value) -> Result<Value, EvalError> {
    let rt = ctx.runtime().clone();
    match node.kind() {
        NodeKind::Const(v) => Ok(v.clone()),
        NodeKind::Property(name) => rt.get_property(ctx, source, &PropertyKey::Name(name.clone())),
        NodeKind::Index(key) => {
            let key = eval_key(ctx, key)?;
            rt.get_property(ctx, source, &key)
        }
        NodeKind::Method { name, args } => {
            let argv = eval_args(ctx, args)?;
            rt.call_method(ctx, source, name, &argv)
        }
        NodeKind::Chain(items) => {
            let mut cur = source.clone();
            for item in items {
                cur = get_value(ctx, item, &cur)?;
            }
            Ok(cur)
        }
        NodeKind::RootVar => Ok(ctx.root().clone()),
        NodeKind::ThisVar => Ok(source.clone()),
        NodeKind::Var(name) => Ok(ctx.var(name).cloned().unwrap_or_default()),
        NodeKind::StaticField { class, field } => {
            let class = ctx.find_class(class)?;
            class.get_static(field).ok_or_else(|| EvalError::NoSuchProperty {
                class: class.name().to_string(),
                name: field.to_string(),
            })
        }
        NodeKind::StaticMethod { class, name, args } => {
            let class = ctx.find_class(class)?;
            let argv = eval_args(ctx, args)?;
            rt.call_static_method(ctx, &class, name, &argv)
        }
        NodeKind::Ctor { class, args } => {
            let class = ctx.find_class(class)?;
            let argv = eval_args(ctx, args)?;
            rt.construct(&class, &argv)
        }
        NodeKind::Not(inner) => Ok(Value::Bool(!get_value(ctx, inner, source)?.is_truthy())),
        NodeKind::And(l, r) => {
            let ok = get_value(ctx, l, source)?.is_truthy() && get_value(ctx, r, source)?.is_truthy();
            Ok(Value::Bool(ok))
        }
        NodeKind::Or(l, r) => {
            let ok = get_value(ctx, l, source)?.is_truthy() || get_value(ctx, r, source)?.is_truthy();
            Ok(Value::Bool(ok))
        }
        NodeKind::Eq(l, r) => {
            let l = get_value(ctx, l, source)?;
            let r = get_value(ctx, r, source)?;
            Ok(Value::Bool(l == r))
        }
        NodeKind::Sequence(items) => {
            let mut last = Value::Null;
            for item in items {
                last = get_value(ctx, item, source)?;
            }
            Ok(last)
        }
    }
}

pub fn set_value(ctx: &mut EvalContext, node: &Node, source: &Value, value: Value) -> Result<(), EvalError> {
    let rt = ctx.runtime().clone();
    match node.kind() {
        NodeKind::Const(_) => Err(EvalError::NotAssignable(messages::CONSTANT_NOT_ASSIGNABLE.to_string())),
        NodeKind::Property(name) => rt.set_property(ctx, source, &PropertyKey::Name(name.clone()), value),
        NodeKind::Index(key) => {
            let key = eval_key(ctx, key)?;
            rt.set_property(ctx, source, &key, value)
        }
        NodeKind::Chain(items) => {
            let Some((last, prefix)) = items.split_last() else {
                return Err(EvalError::NotAssignable(messages::NOT_ASSIGNABLE.to_string()));
            };
            let mut cur = source.clone();
            for item in prefix {
                cur = get_value(ctx, item, &cur)?;
            }
            set_value(ctx, last, &cur, value)
        }
        NodeKind::Var(name) => {
            ctx.set_var(name, value);
            Ok(())
        }
        NodeKind::StaticField { class, field } => {
            let class = ctx.find_class(class)?;
            if class.set_static(field, value) {
                Ok(())
            } else {
                Err(EvalError::NoSuchProperty {
                    class: class.name().to_string(),
                    name: field.to_string(),
                })
            }
        }
        _ => Err(EvalError::NotAssignable(messages::NOT_ASSIGNABLE.to_string())),
    }
}
