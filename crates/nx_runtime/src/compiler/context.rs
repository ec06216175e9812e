//! Static type tracking while generating accessor source.

use std::sync::Arc;

use nx_core::{ClassRef, Value, builtins};

use super::local_ref::LocalReferenceTable;
use crate::ast::Node;
use crate::context::EvalContext;
use crate::errors::SourceError;
use crate::interpreter;
use crate::runtime::Runtime;

/// Static types after one navigation step.
#[derive(Clone, Debug, Default)]
pub struct TypeFrame {
    pub current_type: Option<ClassRef>,
    pub current_accessor: Option<ClassRef>,
    pub previous_type: Option<ClassRef>,
    pub previous_accessor: Option<ClassRef>,
}

/// Type state and cast prefix of an enclosing expression, set aside while a
/// nested one is compiled.
pub struct SavedTypes {
    types: TypeFrame,
    pre_cast: String,
}

pub struct CompilationContext<'a> {
    eval: &'a mut EvalContext,
    runtime: Arc<Runtime>,
    root: Value,
    types: TypeFrame,
    type_stack: Vec<TypeFrame>,
    pre_cast: String,
    constructing: usize,
    refs: LocalReferenceTable,
}

impl<'a> CompilationContext<'a> {
    pub fn new(eval: &'a mut EvalContext, root: Value) -> Self {
        let runtime = eval.runtime().clone();
        Self {
            eval,
            runtime,
            root,
            types: TypeFrame::default(),
            type_stack: Vec::new(),
            pre_cast: String::new(),
            constructing: 0,
            refs: LocalReferenceTable::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn eval(&mut self) -> &mut EvalContext {
        &mut *self.eval
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn current_type(&self) -> Option<&ClassRef> {
        self.types.current_type.as_ref()
    }

    pub fn current_accessor(&self) -> Option<&ClassRef> {
        self.types.current_accessor.as_ref()
    }

    pub fn previous_type(&self) -> Option<&ClassRef> {
        self.types.previous_type.as_ref()
    }

    pub fn previous_accessor(&self) -> Option<&ClassRef> {
        self.types.previous_accessor.as_ref()
    }

    /// Records one navigation step: the value now has static type `ty` and
    /// was reached through a member of `accessor`.
    pub fn narrow(&mut self, ty: Option<ClassRef>, accessor: Option<ClassRef>) {
        self.types.previous_type = std::mem::replace(&mut self.types.current_type, ty);
        self.types.previous_accessor = std::mem::replace(&mut self.types.current_accessor, accessor);
        self.type_stack.push(self.types.clone());
    }

    pub fn type_stack(&self) -> &[TypeFrame] {
        &self.type_stack
    }

    pub fn take_type_stack(&mut self) -> Vec<TypeFrame> {
        std::mem::take(&mut self.type_stack)
    }

    pub fn pre_cast(&self) -> &str {
        &self.pre_cast
    }

    /// Casts open outward, so each new one goes in front.
    pub fn add_cast(&mut self, cast: &str) {
        self.pre_cast.insert_str(0, cast);
    }

    pub fn take_pre_cast(&mut self) -> String {
        std::mem::take(&mut self.pre_cast)
    }

    /// Forgets the type state between the getter and setter passes.
    pub fn reset(&mut self) {
        self.types = TypeFrame::default();
        self.type_stack.clear();
        self.pre_cast.clear();
    }

    pub fn save(&mut self) -> SavedTypes {
        SavedTypes {
            types: std::mem::take(&mut self.types),
            pre_cast: std::mem::take(&mut self.pre_cast),
        }
    }

    pub fn restore(&mut self, saved: SavedTypes) {
        self.types = saved.types;
        self.pre_cast = saved.pre_cast;
    }

    pub fn begin_construction(&mut self) {
        self.constructing += 1;
    }

    pub fn end_construction(&mut self) {
        self.constructing = self.constructing.saturating_sub(1);
    }

    pub fn is_constructing(&self) -> bool {
        self.constructing > 0
    }

    pub fn local_refs(&mut self) -> &mut LocalReferenceTable {
        &mut self.refs
    }

    /// Evaluates `node` to learn the runtime class the generated code will
    /// see. A failure makes the sub-expression uncompilable, not fatal.
    pub fn sample(&mut self, node: &Node, target: &Value) -> Result<Value, SourceError> {
        interpreter::get_value(self.eval, node, target)
            .map_err(|e| SourceError::unsupported(format!("sample evaluation of `{node}` failed: {e}")))
    }
}

/// Source-level name of `class`, with `[]` per array dimension.
pub fn cast_string(class: &ClassRef) -> String {
    let mut s = class.element().name().to_string();
    for _ in 0..class.dimensions() {
        s.push_str("[]");
    }
    s
}

fn needs_cast(cc: &CompilationContext<'_>, node: &Node, body: &str) -> Option<ClassRef> {
    let accessor = cc.current_accessor()?;
    let previous = cc.previous_type()?;
    if accessor.is_assignable_from(previous) || body.trim().is_empty() {
        return None;
    }
    if cc.current_type().is_some_and(|t| t.is_array()) && !previous.ptr_eq(&builtins().object) {
        return None;
    }
    if node.is_boolean()
        || node.is_root_var()
        || node.is_static()
        || node.is_ctor()
        || node.last_expression().is_some()
        || accessor.ptr_eq(&builtins().class)
        || cc.is_constructing()
    {
        return None;
    }
    Some(accessor.clone())
}

/// Casts the value reaching `node` to the class that declares the member
/// it accesses. The opening `((Type)` is deferred to the context's cast
/// prefix; the returned body carries the closing `)`. Also returns the cast
/// type so the caller can guard it at run time.
pub fn cast_expression(cc: &mut CompilationContext<'_>, node: &Node, body: String) -> (String, Option<ClassRef>) {
    match needs_cast(cc, node, &body) {
        Some(ty) => {
            cc.add_cast(&format!("(({})", cast_string(&ty)));
            (format!("){body}"), Some(ty))
        }
        None => (body, None),
    }
}
