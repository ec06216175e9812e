use std::sync::Arc;

use nx_core::{ClassRef, Value};
use smallvec::SmallVec;

use super::MethodAccessor;
use crate::compiler::{CompilationContext, Fragment, Frame, GetCode};
use crate::context::EvalContext;
use crate::errors::{EvalError, SourceError, messages};
use crate::runtime::members::ResolvedMethod;

/// Calls public methods found in the member tables.
pub struct ObjectMethodAccessor;

fn no_such_method(class: &ClassRef, name: &str, argc: usize) -> EvalError {
    EvalError::NoSuchMethod {
        class: class.name().to_string(),
        name: name.to_string(),
        argc,
    }
}

impl MethodAccessor for ObjectMethodAccessor {
    fn call_method(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let class = target.class().ok_or_else(|| EvalError::NullSource(name.to_string()))?;
        let method = ctx
            .runtime()
            .members()
            .find_method(&class, name, args, false)?
            .ok_or_else(|| no_such_method(&class, name, args.len()))?;
        Ok(method.info.invoke(target, args)?)
    }

    fn call_static_method(
        &self,
        ctx: &mut EvalContext,
        class: &ClassRef,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let method = ctx
            .runtime()
            .members()
            .find_method(class, name, args, true)?
            .ok_or_else(|| no_such_method(class, name, args.len()))?;
        Ok(method.info.invoke(&Value::Class(class.clone()), args)?)
    }

    fn source_call(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        name: &str,
        args: &[Fragment],
        samples: &[Value],
    ) -> Result<Fragment, SourceError> {
        let class = target
            .class()
            .ok_or_else(|| SourceError::unsupported(messages::NULL_TARGET))?;
        let rt = cc.runtime().clone();
        let method = rt
            .members()
            .find_method(&class, name, samples, false)?
            .ok_or_else(|| SourceError::unsupported(format!("no method {name} on {class} for these arguments")))?;

        let mut owner = Some(method.declaring.clone());
        if let Some(current) = cc.current_type().filter(|t| !t.is_primitive()) {
            if rt.members().methods(current)?.get(name).iter().any(|m| m.info.same_signature(&method.info)) {
                owner = Some(current.clone());
            }
        }
        cc.narrow(Some(method.info.ret.clone()), owner);

        let arg_source: Vec<&str> = args.iter().map(|a| a.source.as_str()).collect();
        let source = format!(".{name}({})", arg_source.join(", "));
        let site = Arc::new(MethodSite {
            class,
            name: Arc::from(name),
            method,
            args: args.iter().map(|a| a.code.clone()).collect(),
        });
        Ok(Fragment::from_fn(source, move |frame, t| site.call(frame, t)))
    }
}

struct MethodSite {
    class: ClassRef,
    name: Arc<str>,
    method: Arc<ResolvedMethod>,
    args: Vec<GetCode>,
}

impl MethodSite {
    fn call(&self, frame: &mut Frame<'_>, target: &Value) -> Result<Value, EvalError> {
        let mut argv: SmallVec<[Value; 4]> = SmallVec::with_capacity(self.args.len());
        for arg in &self.args {
            argv.push(arg(frame, target)?);
        }
        match target {
            Value::Null => Err(EvalError::NullSource(self.name.to_string())),
            t if t.class().is_some_and(|c| c.ptr_eq(&self.class)) && self.method.info.accepts(&argv) => {
                Ok(self.method.info.invoke(t, &argv)?)
            }
            t => {
                let rt = frame.runtime();
                rt.call_method(frame.ctx(), t, &self.name, &argv)
            }
        }
    }
}
