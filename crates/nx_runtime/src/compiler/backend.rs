//! Turning generated accessor classes into callable accessors.

use std::sync::{Arc, Weak};

use nx_core::Value;

use super::context::TypeFrame;
use super::fragment::{Frame, GetCode, SetCode};
use super::local_ref::LocalMethod;
use super::pool::CompilationPool;
use crate::ast::Node;
use crate::context::EvalContext;
use crate::errors::{BackendError, EvalError};

/// Compiled get/set pair bound to a node.
pub trait NodeAccessor: Send + Sync {
    fn get(&self, ctx: &mut EvalContext, target: &Value) -> Result<Value, EvalError>;

    fn set(&self, ctx: &mut EvalContext, target: &Value, value: Value) -> Result<(), EvalError>;

    fn class_name(&self) -> &str;

    fn get_source(&self) -> &str;

    fn set_source(&self) -> &str;

    /// Static types recorded while the getter was generated.
    fn type_trace(&self) -> &[TypeFrame] {
        &[]
    }
}

pub struct GeneratedMethod<C> {
    /// Declaration text for diagnostics; only `code` is executed.
    pub signature: String,
    pub source: String,
    pub code: C,
}

/// Everything the compiler produced for one node.
pub struct AccessorClass {
    pub name: String,
    pub getter: GeneratedMethod<GetCode>,
    pub setter: GeneratedMethod<SetCode>,
    pub locals: Vec<LocalMethod>,
    /// Node the generated code was built for; it must still be alive
    /// when the class is defined.
    pub node: Weak<Node>,
    pub delegates: bool,
    pub type_trace: Vec<TypeFrame>,
}

pub trait AccessorBackend: Send + Sync {
    fn define(&self, pool: &CompilationPool, class: AccessorClass) -> Result<Arc<dyn NodeAccessor>, BackendError>;
}

/// Executes the closures behind the generated source directly.
pub struct ClosureBackend;

impl AccessorBackend for ClosureBackend {
    fn define(&self, pool: &CompilationPool, class: AccessorClass) -> Result<Arc<dyn NodeAccessor>, BackendError> {
        validate_source(&class.name, "get", &class.getter.source)?;
        validate_source(&class.name, "set", &class.setter.source)?;
        for local in &class.locals {
            validate_source(&class.name, &local.name, &local.source)?;
        }
        if class.node.strong_count() == 0 {
            return Err(BackendError::Instantiation {
                class: class.name,
                reason: "expression node was dropped".to_string(),
            });
        }
        pool.record_defined(&class.name);
        Ok(Arc::new(GeneratedAccessor {
            name: class.name,
            get_source: class.getter.source,
            set_source: class.setter.source,
            get_code: class.getter.code,
            set_code: class.setter.code,
            locals: class.locals,
            type_trace: class.type_trace,
        }))
    }
}

/// Checks a method body is braced and its delimiters balance outside
/// string literals.
pub fn validate_source(class: &str, method: &str, source: &str) -> Result<(), BackendError> {
    let invalid = |reason: String| BackendError::InvalidSource {
        class: class.to_string(),
        method: method.to_string(),
        reason,
    };
    let body = source.trim();
    if body.is_empty() {
        return Err(invalid("empty body".to_string()));
    }
    if !body.starts_with('{') || !body.ends_with('}') {
        return Err(invalid(format!("body is not a block: {body}")));
    }
    let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in body.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => open.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if open.pop() != Some(expected) {
                    return Err(invalid(format!("unbalanced `{c}` in {body}")));
                }
            }
            _ => {}
        }
    }
    if in_string {
        return Err(invalid(format!("unterminated string literal in {body}")));
    }
    if let Some(c) = open.last() {
        return Err(invalid(format!("unclosed `{c}` in {body}")));
    }
    Ok(())
}

struct GeneratedAccessor {
    name: String,
    get_source: String,
    set_source: String,
    get_code: GetCode,
    set_code: SetCode,
    locals: Vec<LocalMethod>,
    type_trace: Vec<TypeFrame>,
}

impl NodeAccessor for GeneratedAccessor {
    fn get(&self, ctx: &mut EvalContext, target: &Value) -> Result<Value, EvalError> {
        let mut frame = Frame::new(ctx, &self.locals);
        (self.get_code)(&mut frame, target)
    }

    fn set(&self, ctx: &mut EvalContext, target: &Value, value: Value) -> Result<(), EvalError> {
        let mut frame = Frame::new(ctx, &self.locals);
        (self.set_code)(&mut frame, target, value)
    }

    fn class_name(&self) -> &str {
        &self.name
    }

    fn get_source(&self) -> &str {
        &self.get_source
    }

    fn set_source(&self) -> &str {
        &self.set_source
    }

    fn type_trace(&self) -> &[TypeFrame] {
        &self.type_trace
    }
}
