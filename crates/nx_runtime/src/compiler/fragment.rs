//! Generated code fragments.
//!
//! A fragment pairs the source text the compiler reasons about with the
//! closure that executes it. Closures receive the per-invocation `Frame`
//! and the value the fragment navigates from.

use std::sync::Arc;

use nx_core::{ClassRef, Value};
use smallvec::SmallVec;

use super::local_ref::LocalMethod;
use crate::ast::NodeRef;
use crate::context::EvalContext;
use crate::errors::EvalError;
use crate::interpreter;
use crate::runtime::Runtime;

pub type GetCode = Arc<dyn Fn(&mut Frame<'_>, &Value) -> Result<Value, EvalError> + Send + Sync>;
pub type SetCode = Arc<dyn Fn(&mut Frame<'_>, &Value, Value) -> Result<(), EvalError> + Send + Sync>;

/// Boxes a closure as `GetCode`, fixing its signature for inference.
pub fn get_code<F>(f: F) -> GetCode
where
    F: Fn(&mut Frame<'_>, &Value) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn set_code<F>(f: F) -> SetCode
where
    F: Fn(&mut Frame<'_>, &Value, Value) -> Result<(), EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub struct Fragment {
    pub source: String,
    pub code: GetCode,
    /// `(core, last)` split of statement sequences, returned as
    /// `{ core return last;}`.
    pub ordered: Option<(String, String)>,
}

impl Fragment {
    pub fn new(source: impl Into<String>, code: GetCode) -> Self {
        Self {
            source: source.into(),
            code,
            ordered: None,
        }
    }

    pub fn from_fn<F>(source: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, &Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self::new(source, get_code(f))
    }

    /// Empty source that yields its target unchanged.
    pub fn identity() -> Self {
        Self::from_fn("", |_, target| Ok(target.clone()))
    }

    /// Literal fragment, or `None` for values without a literal form.
    pub fn literal(value: &Value) -> Option<Self> {
        let source = literal_source(value)?;
        let value = value.clone();
        Some(Self::from_fn(source, move |_, _| Ok(value.clone())))
    }
}

#[derive(Clone)]
pub struct SetFragment {
    pub source: String,
    pub code: SetCode,
}

impl SetFragment {
    pub fn from_fn<F>(source: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, &Value, Value) -> Result<(), EvalError> + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            code: set_code(f),
        }
    }
}

pub fn literal_source(value: &Value) -> Option<String> {
    Some(match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => format!("{i}L"),
        Value::Float(x) => format!("{x:?}d"),
        Value::Str(s) => format!("{:?}", &**s),
        _ => return None,
    })
}

/// Runtime check behind a `((Type)...)` cast. Null passes, as in a cast.
pub fn check_cast(ty: &ClassRef, value: &Value) -> Result<(), EvalError> {
    if value.is_null() || ty.is_instance(value) {
        return Ok(());
    }
    Err(EvalError::Incompatible {
        expected: ty.name().to_string(),
        found: value.type_name(),
    })
}

/// Runs `code` when the value reaching `node` passes the cast to `ty`.
/// Otherwise `node` alone is interpreted against that value, so the hops
/// before it are not evaluated again.
pub fn guard(ty: ClassRef, code: GetCode, node: &NodeRef) -> GetCode {
    let node = Arc::downgrade(node);
    get_code(move |frame, target| {
        if check_cast(&ty, target).is_ok() {
            return code(frame, target);
        }
        let node = node.upgrade().ok_or(EvalError::Detached)?;
        tracing::trace!(
            expected = %ty,
            found = %target.type_name(),
            expression = %node,
            "cast guard failed, interpreting"
        );
        interpreter::get_value(frame.ctx(), &node, target)
    })
}

pub fn guard_set(ty: ClassRef, code: SetCode, node: &NodeRef) -> SetCode {
    let node = Arc::downgrade(node);
    set_code(move |frame, target, value| {
        if check_cast(&ty, target).is_ok() {
            return code(frame, target, value);
        }
        let node = node.upgrade().ok_or(EvalError::Detached)?;
        tracing::trace!(
            expected = %ty,
            found = %target.type_name(),
            expression = %node,
            "cast guard failed, interpreting"
        );
        interpreter::set_value(frame.ctx(), &node, target, value)
    })
}

/// Runs `next` on the value `first` produced.
pub fn then(first: GetCode, next: GetCode) -> GetCode {
    get_code(move |frame, target| {
        let v = first(frame, target)?;
        next(frame, &v)
    })
}

pub fn then_set(first: GetCode, next: SetCode) -> SetCode {
    set_code(move |frame, target, value| {
        let v = first(frame, target)?;
        next(frame, &v, value)
    })
}

/// State of one accessor invocation.
pub struct Frame<'a> {
    ctx: &'a mut EvalContext,
    locals: &'a [LocalMethod],
    memo: SmallVec<[Option<Value>; 4]>,
}

impl<'a> Frame<'a> {
    pub fn new(ctx: &'a mut EvalContext, locals: &'a [LocalMethod]) -> Self {
        Self {
            ctx,
            locals,
            memo: SmallVec::new(),
        }
    }

    pub fn ctx(&mut self) -> &mut EvalContext {
        &mut *self.ctx
    }

    pub fn runtime(&self) -> Arc<Runtime> {
        self.ctx.runtime().clone()
    }

    pub fn root(&self) -> Value {
        self.ctx.root().clone()
    }

    /// Value of local reference `index`, evaluated against the root at most
    /// once per invocation.
    pub fn local(&mut self, index: usize) -> Result<Value, EvalError> {
        if let Some(Some(v)) = self.memo.get(index) {
            return Ok(v.clone());
        }
        let locals = self.locals;
        let method = locals.get(index).ok_or(EvalError::MissingLocal(index))?;
        let root = self.root();
        let v = (method.code)(self, &root)?;
        if self.memo.len() <= index {
            self.memo.resize(index + 1, None);
        }
        self.memo[index] = Some(v.clone());
        Ok(v)
    }
}
