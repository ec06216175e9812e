//! Per-node source generation.
//!
//! `get_source` and `set_source` return the body of one node relative to
//! the value it navigates from, narrowing the static types in the
//! compilation context as they go. Sub-expressions that evaluate against
//! the root are compiled on their own and hoisted into local references.

use std::sync::Arc;

use nx_core::{ClassRef, Value, builtins};
use smallvec::SmallVec;

use super::context::{CompilationContext, cast_expression, cast_string};
use super::fragment::{Fragment, Frame, GetCode, SetFragment, get_code, guard, guard_set, then, then_set};
use crate::accessors::{KeySource, MethodAccessor, PropertyAccessor, PropertyKey};
use crate::ast::{Node, NodeKind, NodeRef};
use crate::errors::{EvalError, SourceError, messages};

/// Whether the node's source continues from the value it navigates from,
/// as opposed to standing on its own.
pub fn needs_target(node: &Node) -> bool {
    match node.kind() {
        NodeKind::Property(_) | NodeKind::Index(_) | NodeKind::Method { .. } | NodeKind::ThisVar => true,
        NodeKind::Chain(items) => items.first().is_some_and(|first| needs_target(first)),
        _ => false,
    }
}

/// `((Type)$2)`: the accessor's target parameter cast to `class`.
pub fn target_expression(class: &ClassRef) -> String {
    format!("(({})$2)", cast_string(class))
}

fn property_handler(
    cc: &CompilationContext<'_>,
    target: &Value,
) -> Result<Arc<dyn PropertyAccessor>, SourceError> {
    let class = target
        .class()
        .ok_or_else(|| SourceError::unsupported(messages::NULL_TARGET))?;
    cc.runtime()
        .property_accessor(&class)
        .map_err(|e| SourceError::unsupported(e.to_string()))
}

fn method_handler(cc: &CompilationContext<'_>, class: &ClassRef) -> Result<Arc<dyn MethodAccessor>, SourceError> {
    cc.runtime()
        .method_accessor(class)
        .map_err(|e| SourceError::unsupported(e.to_string()))
}

fn find_class(cc: &mut CompilationContext<'_>, name: &str) -> Result<ClassRef, SourceError> {
    cc.eval()
        .find_class(name)
        .map_err(|e| SourceError::unsupported(e.to_string()))
}

/// Compiles `node` as a self-contained expression evaluated against
/// `target`, leaving the enclosing type state untouched.
pub fn compile_operand(
    cc: &mut CompilationContext<'_>,
    node: &NodeRef,
    target: &Value,
) -> Result<Fragment, SourceError> {
    let saved = cc.save();
    let result = get_source(cc, node, target);
    let pre_cast = cc.take_pre_cast();
    cc.restore(saved);
    let frag = result?;
    if !needs_target(node) {
        return Ok(Fragment {
            source: format!("{pre_cast}{}", frag.source),
            ..frag
        });
    }
    let class = target
        .class()
        .ok_or_else(|| SourceError::unsupported(messages::NULL_TARGET))?;
    Ok(Fragment::new(
        format!("{pre_cast}{}{}", target_expression(&class), frag.source),
        guard(class, frag.code, node),
    ))
}

/// Compiles a root-relative sub-expression. Literals are inlined; anything
/// else becomes a local reference.
fn compile_against_root(cc: &mut CompilationContext<'_>, node: &NodeRef, sample: &Value) -> Result<Fragment, SourceError> {
    if let NodeKind::Const(v) = node.kind() {
        if let Some(lit) = Fragment::literal(v) {
            return Ok(lit);
        }
    }
    let root = cc.root().clone();
    let operand = compile_operand(cc, node, &root)?;
    let ty = sample.class().unwrap_or_else(|| builtins().object.clone());
    Ok(cc.local_refs().create(&operand.source, &ty, operand.code))
}

fn key_source(cc: &mut CompilationContext<'_>, key: &NodeRef) -> Result<KeySource, SourceError> {
    let invalid = |e: EvalError| SourceError::unsupported(e.to_string());
    if let NodeKind::Const(v) = key.kind() {
        return Ok(KeySource::Const(PropertyKey::from_value(v).map_err(invalid)?));
    }
    let root = cc.root().clone();
    let sample = cc.sample(key, &root)?;
    let fragment = compile_against_root(cc, key, &sample)?;
    Ok(KeySource::Dynamic {
        fragment,
        sample: PropertyKey::from_value(&sample).map_err(invalid)?,
    })
}

fn argument_sources(
    cc: &mut CompilationContext<'_>,
    args: &[NodeRef],
) -> Result<(Vec<Fragment>, Vec<Value>), SourceError> {
    let root = cc.root().clone();
    let mut fragments = Vec::with_capacity(args.len());
    let mut samples = Vec::with_capacity(args.len());
    for arg in args {
        let sample = cc.sample(arg, &root)?;
        fragments.push(compile_against_root(cc, arg, &sample)?);
        samples.push(sample);
    }
    Ok((fragments, samples))
}

fn eval_all(codes: &[GetCode], frame: &mut Frame<'_>, target: &Value) -> Result<SmallVec<[Value; 4]>, EvalError> {
    let mut out = SmallVec::with_capacity(codes.len());
    for code in codes {
        out.push(code(frame, target)?);
    }
    Ok(out)
}

fn join_sources(fragments: &[Fragment]) -> String {
    fragments.iter().map(|f| f.source.as_str()).collect::<Vec<_>>().join(", ")
}

pub fn get_source(cc: &mut CompilationContext<'_>, node: &Node, target: &Value) -> Result<Fragment, SourceError> {
    let b = builtins();
    match node.kind() {
        NodeKind::Const(v) => {
            let lit = Fragment::literal(v)
                .ok_or_else(|| SourceError::unsupported(format!("{} has no literal form", v.type_name())))?;
            cc.narrow(v.class(), None);
            Ok(lit)
        }
        NodeKind::Property(name) => {
            let handler = property_handler(cc, target)?;
            handler.source_accessor(cc, target, &KeySource::Const(PropertyKey::Name(name.clone())))
        }
        NodeKind::Index(key) => {
            let handler = property_handler(cc, target)?;
            let key = key_source(cc, key)?;
            handler.source_accessor(cc, target, &key)
        }
        NodeKind::Method { name, args } => {
            let class = target
                .class()
                .ok_or_else(|| SourceError::unsupported(messages::NULL_TARGET))?;
            let handler = method_handler(cc, &class)?;
            let (fragments, samples) = argument_sources(cc, args)?;
            handler.source_call(cc, target, name, &fragments, &samples)
        }
        NodeKind::Chain(items) => chain_source(cc, items, target),
        NodeKind::RootVar => {
            cc.narrow(cc.root().class(), None);
            Ok(Fragment::from_fn("$1.getRoot()", |frame, _| Ok(frame.root())))
        }
        NodeKind::ThisVar => Ok(Fragment::identity()),
        NodeKind::Var(name) => {
            let ty = cc.eval().var(name).and_then(Value::class);
            cc.narrow(ty, None);
            let name = name.clone();
            Ok(Fragment::from_fn(format!("$1.get({:?})", &*name), move |frame, _| {
                Ok(frame.ctx().var(&name).cloned().unwrap_or_default())
            }))
        }
        NodeKind::StaticField { class, field } => {
            let class = find_class(cc, class)?;
            let fields = cc.runtime().members().fields(&class)?;
            let info = fields
                .get(field)
                .filter(|f| f.info.is_static && f.info.is_public)
                .ok_or_else(|| SourceError::unsupported(format!("no public static field {field} on {class}")))?;
            cc.narrow(Some(info.info.ty.clone()), Some(class.clone()));
            let field = field.clone();
            let source = format!("{}.{field}", cast_string(&class));
            Ok(Fragment::from_fn(source, move |_, _| {
                class.get_static(&field).ok_or_else(|| EvalError::NoSuchProperty {
                    class: class.name().to_string(),
                    name: field.to_string(),
                })
            }))
        }
        NodeKind::StaticMethod { class, name, args } => {
            let class = find_class(cc, class)?;
            let (fragments, samples) = argument_sources(cc, args)?;
            let method = cc
                .runtime()
                .members()
                .find_method(&class, name, &samples, true)?
                .ok_or_else(|| SourceError::unsupported(format!("no static method {name} on {class}")))?;
            cc.narrow(Some(method.info.ret.clone()), Some(class.clone()));
            let source = format!("{}.{name}({})", cast_string(&class), join_sources(&fragments));
            let codes: Vec<GetCode> = fragments.into_iter().map(|f| f.code).collect();
            let name = name.clone();
            Ok(Fragment::from_fn(source, move |frame, t| {
                let argv = eval_all(&codes, frame, t)?;
                if method.info.accepts(&argv) {
                    return Ok(method.info.invoke(&Value::Class(class.clone()), &argv)?);
                }
                let rt = frame.runtime();
                rt.call_static_method(frame.ctx(), &class, &name, &argv)
            }))
        }
        NodeKind::Ctor { class, args } => {
            let class = find_class(cc, class)?;
            cc.begin_construction();
            let sources = argument_sources(cc, args);
            cc.end_construction();
            let (fragments, samples) = sources?;
            let ctor = class
                .constructors()
                .iter()
                .find(|c| c.accepts(&samples))
                .cloned()
                .ok_or_else(|| SourceError::unsupported(format!("no constructor of {class} for these arguments")))?;
            cc.narrow(Some(class.clone()), None);
            let source = format!("new {}({})", cast_string(&class), join_sources(&fragments));
            let codes: Vec<GetCode> = fragments.into_iter().map(|f| f.code).collect();
            Ok(Fragment::from_fn(source, move |frame, t| {
                let argv = eval_all(&codes, frame, t)?;
                if ctor.accepts(&argv) {
                    return Ok((ctor.body)(&class, &argv)?);
                }
                frame.runtime().construct(&class, &argv)
            }))
        }
        NodeKind::Not(inner) => {
            let op = compile_operand(cc, inner, target)?;
            cc.narrow(Some(b.prim_boolean.clone()), None);
            let code = op.code;
            Ok(Fragment::from_fn(format!("!({})", op.source), move |frame, t| {
                Ok(Value::Bool(!code(frame, t)?.is_truthy()))
            }))
        }
        NodeKind::And(l, r) | NodeKind::Or(l, r) => {
            let is_and = matches!(node.kind(), NodeKind::And(..));
            let l = compile_operand(cc, l, target)?;
            let r = compile_operand(cc, r, target)?;
            cc.narrow(Some(b.prim_boolean.clone()), None);
            let op = if is_and { "&&" } else { "||" };
            let source = format!("({} {op} {})", l.source, r.source);
            let (lc, rc) = (l.code, r.code);
            Ok(Fragment::from_fn(source, move |frame, t| {
                let lv = lc(frame, t)?.is_truthy();
                let v = if is_and { lv && rc(frame, t)?.is_truthy() } else { lv || rc(frame, t)?.is_truthy() };
                Ok(Value::Bool(v))
            }))
        }
        NodeKind::Eq(l, r) => {
            let l = compile_operand(cc, l, target)?;
            let r = compile_operand(cc, r, target)?;
            cc.narrow(Some(b.prim_boolean.clone()), None);
            let source = format!("$1.equals({}, {})", l.source, r.source);
            let (lc, rc) = (l.code, r.code);
            Ok(Fragment::from_fn(source, move |frame, t| {
                let lv = lc(frame, t)?;
                let rv = rc(frame, t)?;
                Ok(Value::Bool(lv == rv))
            }))
        }
        NodeKind::Sequence(items) => sequence_source(cc, items, target),
    }
}

fn chain_source(cc: &mut CompilationContext<'_>, items: &[NodeRef], target: &Value) -> Result<Fragment, SourceError> {
    let mut source = String::new();
    let mut code: Option<GetCode> = None;
    let mut sample = target.clone();
    for (i, item) in items.iter().enumerate() {
        let frag = get_source(cc, item, &sample)?;
        let (body, cast) = cast_expression(cc, item, frag.source);
        source.push_str(&body);
        let step = match cast {
            Some(ty) => guard(ty, frag.code, item),
            None => frag.code,
        };
        code = Some(match code {
            Some(prev) => then(prev, step),
            None => step,
        });
        if i + 1 < items.len() {
            sample = cc.sample(item, &sample)?;
        }
    }
    Ok(match code {
        Some(code) => Fragment::new(source, code),
        None => Fragment::identity(),
    })
}

fn sequence_source(cc: &mut CompilationContext<'_>, items: &[NodeRef], target: &Value) -> Result<Fragment, SourceError> {
    let mut operands = Vec::with_capacity(items.len());
    for item in items {
        operands.push(compile_operand(cc, item, target)?);
    }
    let Some(last) = operands.pop() else {
        cc.narrow(None, None);
        return Ok(Fragment::from_fn("null", |_, _| Ok(Value::Null)));
    };
    cc.narrow(None, None);
    let core: Vec<String> = operands.iter().map(|o| format!("{};", o.source)).collect();
    let core = core.join(" ");
    let ordered = (!operands.is_empty()).then(|| (core.clone(), last.source.clone()));
    let source = if core.is_empty() { last.source.clone() } else { format!("{core} {}", last.source) };
    let mut codes: Vec<GetCode> = operands.into_iter().map(|o| o.code).collect();
    codes.push(last.code);
    Ok(Fragment {
        source,
        code: get_code(move |frame, t| {
            let mut v = Value::Null;
            for code in &codes {
                v = code(frame, t)?;
            }
            Ok(v)
        }),
        ordered,
    })
}

pub fn set_source(cc: &mut CompilationContext<'_>, node: &Node, target: &Value) -> Result<SetFragment, SourceError> {
    match node.kind() {
        NodeKind::Const(_) => Err(SourceError::unsupported(messages::CONSTANT_NOT_ASSIGNABLE)),
        NodeKind::Property(name) => {
            let handler = property_handler(cc, target)?;
            handler.source_setter(cc, target, &KeySource::Const(PropertyKey::Name(name.clone())))
        }
        NodeKind::Index(key) => {
            let handler = property_handler(cc, target)?;
            let key = key_source(cc, key)?;
            handler.source_setter(cc, target, &key)
        }
        NodeKind::Chain(items) => {
            let Some((last, prefix)) = items.split_last() else {
                return Err(SourceError::unsupported(messages::NOT_ASSIGNABLE));
            };
            let mut source = String::new();
            let mut code: Option<GetCode> = None;
            let mut sample = target.clone();
            for item in prefix {
                let frag = get_source(cc, item, &sample)?;
                let (body, cast) = cast_expression(cc, item, frag.source);
                source.push_str(&body);
                let step = cast.map_or(frag.code.clone(), |ty| guard(ty, frag.code, item));
                code = Some(match code {
                    Some(prev) => then(prev, step),
                    None => step,
                });
                sample = cc.sample(item, &sample)?;
            }
            let set = set_source(cc, last, &sample)?;
            let (body, cast) = cast_expression(cc, last, set.source);
            source.push_str(&body);
            let step = cast.map_or(set.code.clone(), |ty| guard_set(ty, set.code, last));
            Ok(SetFragment {
                source,
                code: match code {
                    Some(prev) => then_set(prev, step),
                    None => step,
                },
            })
        }
        NodeKind::Var(name) => {
            let name = name.clone();
            Ok(SetFragment::from_fn(format!("$1.put({:?}, $3)", &*name), move |frame, _, v| {
                frame.ctx().set_var(&name, v);
                Ok(())
            }))
        }
        NodeKind::StaticField { class, field } => {
            let class = find_class(cc, class)?;
            let field = field.clone();
            let source = format!("{}.{field} = $3", cast_string(&class));
            Ok(SetFragment::from_fn(source, move |_, _, v| {
                if class.set_static(&field, v) {
                    Ok(())
                } else {
                    Err(EvalError::NoSuchProperty {
                        class: class.name().to_string(),
                        name: field.to_string(),
                    })
                }
            }))
        }
        _ => Err(SourceError::unsupported(messages::NOT_ASSIGNABLE)),
    }
}
