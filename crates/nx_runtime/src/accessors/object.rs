//! Bean-style property access: getters, setters and public fields.

use std::sync::Arc;

use nx_core::{ClassRef, Value};

use super::{KeySource, PropertyAccessor, PropertyKey};
use crate::compiler::{CompilationContext, Fragment, Frame, SetFragment};
use crate::context::EvalContext;
use crate::errors::{EvalError, SourceError, messages};
use crate::runtime::Runtime;
use crate::runtime::members::PropertyDescriptor;

pub struct ObjectPropertyAccessor;

fn no_such_property(target: &Value, name: &str) -> EvalError {
    EvalError::NoSuchProperty {
        class: target.type_name(),
        name: name.to_string(),
    }
}

impl PropertyAccessor for ObjectPropertyAccessor {
    fn get_property(&self, ctx: &mut EvalContext, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
        let name = key.as_name();
        let class = target.class().ok_or_else(|| EvalError::NullSource(name.to_string()))?;
        match ctx.runtime().members().property(&class, &name)? {
            Some(desc) if desc.is_readable() => desc.read_value(target),
            _ => Err(no_such_property(target, &name)),
        }
    }

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), EvalError> {
        let name = key.as_name();
        let class = target.class().ok_or_else(|| EvalError::NullSource(name.to_string()))?;
        match ctx.runtime().members().property(&class, &name)? {
            Some(desc) => desc.write_value(target, value),
            None => Err(no_such_property(target, &name)),
        }
    }

    fn source_accessor(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        key: &KeySource,
    ) -> Result<Fragment, SourceError> {
        let (class, name, desc) = describe(cc, target, key)?;
        if !desc.is_readable() {
            return Err(SourceError::unsupported(format!("{name} on {class} has no getter")));
        }
        let accessor = static_owner(cc, &name, desc.declaring(), PropertyDescriptor::is_readable)?;
        cc.narrow(Some(desc.ty.clone()), accessor);
        let site = Arc::new(PropertySite { class, name, desc });
        Ok(Fragment::from_fn(site.desc.read_source(), move |frame, t| site.get(frame, t)))
    }

    fn source_setter(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        key: &KeySource,
    ) -> Result<SetFragment, SourceError> {
        let (class, name, desc) = describe(cc, target, key)?;
        if !desc.is_writable() {
            return Err(SourceError::unsupported(format!("{name} on {class} has no setter")));
        }
        let accessor = static_owner(cc, &name, desc.write_declaring(), PropertyDescriptor::is_writable)?;
        cc.narrow(Some(desc.ty.clone()), accessor);
        let site = Arc::new(PropertySite { class, name, desc });
        Ok(SetFragment::from_fn(site.desc.write_source("$3"), move |frame, t, v| {
            site.set(frame, t, v)
        }))
    }
}

fn describe(
    cc: &CompilationContext<'_>,
    target: &Value,
    key: &KeySource,
) -> Result<(ClassRef, Arc<str>, Arc<PropertyDescriptor>), SourceError> {
    let KeySource::Const(PropertyKey::Name(name)) = key else {
        return Err(SourceError::unsupported("object properties need a constant name"));
    };
    let class = target
        .class()
        .ok_or_else(|| SourceError::unsupported(messages::NULL_TARGET))?;
    let desc = cc
        .runtime()
        .members()
        .property(&class, name)?
        .ok_or_else(|| SourceError::unsupported(format!("no property {name} on {class}")))?;
    Ok((class, name.clone(), desc))
}

/// The static type of the target when it already exposes the property,
/// otherwise the class declaring the member.
fn static_owner(
    cc: &CompilationContext<'_>,
    name: &str,
    declaring: Option<&ClassRef>,
    usable: fn(&PropertyDescriptor) -> bool,
) -> Result<Option<ClassRef>, SourceError> {
    if let Some(current) = cc.current_type().filter(|t| !t.is_primitive()) {
        if cc.runtime().members().property(current, name)?.is_some_and(|d| usable(&d)) {
            return Ok(Some(current.clone()));
        }
    }
    Ok(declaring.cloned())
}

/// Compiled property access, specialized for the class seen at compile time.
struct PropertySite {
    class: ClassRef,
    name: Arc<str>,
    desc: Arc<PropertyDescriptor>,
}

impl PropertySite {
    fn get(&self, frame: &mut Frame<'_>, target: &Value) -> Result<Value, EvalError> {
        match target {
            Value::Null => Err(EvalError::NullSource(self.name.to_string())),
            t if t.class().is_some_and(|c| c.ptr_eq(&self.class)) => self.desc.read_value(t),
            t => {
                let rt: Arc<Runtime> = frame.runtime();
                rt.get_property(frame.ctx(), t, &PropertyKey::Name(self.name.clone()))
            }
        }
    }

    fn set(&self, frame: &mut Frame<'_>, target: &Value, value: Value) -> Result<(), EvalError> {
        match target {
            Value::Null => Err(EvalError::NullSource(self.name.to_string())),
            t if t.class().is_some_and(|c| c.ptr_eq(&self.class)) => self.desc.write_value(t, value),
            t => {
                let rt = frame.runtime();
                rt.set_property(frame.ctx(), t, &PropertyKey::Name(self.name.clone()), value)
            }
        }
    }
}
