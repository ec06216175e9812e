use nx_core::{ClassRef, Value, builtins};

use super::{KeySource, ObjectPropertyAccessor, PropertyAccessor, PropertyKey, checked_index, dynamic_key_source};
use crate::compiler::{CompilationContext, Fragment, Frame, SetFragment};
use crate::context::EvalContext;
use crate::errors::{EvalError, SourceError};

/// Element access and `length` on arrays of any component class.
pub struct ArrayPropertyAccessor;

fn array_get(target: &Value, key: &PropertyKey) -> Option<Result<Value, EvalError>> {
    let Value::Array(array) = target else {
        return None;
    };
    Some(match key {
        PropertyKey::Index(i) => checked_index(*i, array.len())
            .and_then(|i| array.get(i).ok_or(EvalError::IndexOutOfBounds { index: i as i64, len: array.len() })),
        PropertyKey::Name(n) if &**n == "length" => Ok(Value::Int(array.len() as i64)),
        PropertyKey::Name(n) => Err(EvalError::NoSuchProperty {
            class: target.type_name(),
            name: n.to_string(),
        }),
    })
}

fn read(frame: &mut Frame<'_>, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
    match array_get(target, key) {
        Some(r) => r,
        None => {
            let rt = frame.runtime();
            rt.get_property(frame.ctx(), target, key)
        }
    }
}

/// The static array type when one is known, else the runtime array class.
fn array_owner(cc: &CompilationContext<'_>, target: &Value) -> Option<ClassRef> {
    cc.current_type().filter(|t| t.is_array()).cloned().or_else(|| target.class())
}

impl PropertyAccessor for ArrayPropertyAccessor {
    fn get_property(&self, ctx: &mut EvalContext, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
        match array_get(target, key) {
            Some(r) => r,
            None => ObjectPropertyAccessor.get_property(ctx, target, key),
        }
    }

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), EvalError> {
        let Value::Array(array) = target else {
            return ObjectPropertyAccessor.set_property(ctx, target, key, value);
        };
        match key {
            PropertyKey::Index(i) => {
                let idx = checked_index(*i, array.len())?;
                if let Some(component) = array.class().component() {
                    if !value.is_null() && !component.is_instance(&value) {
                        return Err(EvalError::Incompatible {
                            expected: component.name().to_string(),
                            found: value.type_name(),
                        });
                    }
                }
                if array.set(idx, value) {
                    Ok(())
                } else {
                    Err(EvalError::IndexOutOfBounds { index: *i, len: array.len() })
                }
            }
            PropertyKey::Name(n) => Err(EvalError::ReadOnly {
                class: target.type_name(),
                name: n.to_string(),
            }),
        }
    }

    fn source_accessor(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        key: &KeySource,
    ) -> Result<Fragment, SourceError> {
        if !matches!(target, Value::Array(_)) {
            return ObjectPropertyAccessor.source_accessor(cc, target, key);
        }
        let owner = array_owner(cc, target);
        let component = owner
            .as_ref()
            .and_then(|o| o.component().cloned())
            .unwrap_or_else(|| builtins().object.clone());
        let (source, ty) = match key {
            KeySource::Const(PropertyKey::Index(i)) => (format!("[{i}]"), component),
            KeySource::Const(PropertyKey::Name(n)) if &**n == "length" => {
                (".length".to_string(), builtins().prim_long.clone())
            }
            KeySource::Dynamic { fragment, sample: sample @ PropertyKey::Index(_) } => {
                (format!("[{}]", dynamic_key_source(fragment, sample)), component)
            }
            _ => return Err(SourceError::unsupported("array access needs an index or length")),
        };
        cc.narrow(Some(ty), owner);
        Ok(match key.clone() {
            KeySource::Const(k) => Fragment::from_fn(source, move |frame, t| read(frame, t, &k)),
            KeySource::Dynamic { fragment, .. } => Fragment::from_fn(source, move |frame, t| {
                let k = PropertyKey::from_value(&(fragment.code)(frame, t)?)?;
                read(frame, t, &k)
            }),
        })
    }

    fn source_setter(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        key: &KeySource,
    ) -> Result<SetFragment, SourceError> {
        if !matches!(target, Value::Array(_)) {
            return ObjectPropertyAccessor.source_setter(cc, target, key);
        }
        let source = match key {
            KeySource::Const(PropertyKey::Index(i)) => format!("[{i}] = $3"),
            KeySource::Dynamic { fragment, sample: sample @ PropertyKey::Index(_) } => {
                format!("[{}] = $3", dynamic_key_source(fragment, sample))
            }
            _ => return Err(SourceError::unsupported("array assignment needs an index")),
        };
        let owner = array_owner(cc, target);
        let component = owner.as_ref().and_then(|o| o.component().cloned());
        cc.narrow(component, owner);
        let key = key.clone();
        Ok(SetFragment::from_fn(source, move |frame, t, v| {
            let k = match &key {
                KeySource::Const(k) => k.clone(),
                KeySource::Dynamic { fragment, .. } => PropertyKey::from_value(&(fragment.code)(frame, t)?)?,
            };
            let rt = frame.runtime();
            rt.set_property(frame.ctx(), t, &k, v)
        }))
    }
}
