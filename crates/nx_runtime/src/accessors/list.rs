use nx_core::{Value, builtins};

use super::{KeySource, ObjectPropertyAccessor, PropertyAccessor, PropertyKey, checked_index, dynamic_key_source};
use crate::compiler::{CompilationContext, Fragment, Frame, SetFragment};
use crate::context::EvalContext;
use crate::errors::{EvalError, SourceError};

/// Indexed access on lists, plus the `size` pseudo-property.
pub struct ListPropertyAccessor;

fn list_get(target: &Value, key: &PropertyKey) -> Option<Result<Value, EvalError>> {
    let Value::List(list) = target else {
        return None;
    };
    let items = list.read();
    Some(match key {
        PropertyKey::Index(i) => checked_index(*i, items.len()).map(|i| items[i].clone()),
        PropertyKey::Name(n) if &**n == "size" => Ok(Value::Int(items.len() as i64)),
        PropertyKey::Name(n) if &**n == "isEmpty" => Ok(Value::Bool(items.is_empty())),
        PropertyKey::Name(_) => return None,
    })
}

fn read(frame: &mut Frame<'_>, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
    match list_get(target, key) {
        Some(r) => r,
        None => {
            let rt = frame.runtime();
            rt.get_property(frame.ctx(), target, key)
        }
    }
}

impl PropertyAccessor for ListPropertyAccessor {
    fn get_property(&self, ctx: &mut EvalContext, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
        match list_get(target, key) {
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
        match (target, key) {
            (Value::List(list), PropertyKey::Index(i)) => {
                let mut items = list.write();
                let i = checked_index(*i, items.len())?;
                items[i] = value;
                Ok(())
            }
            _ => ObjectPropertyAccessor.set_property(ctx, target, key, value),
        }
    }

    fn source_accessor(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        key: &KeySource,
    ) -> Result<Fragment, SourceError> {
        if !matches!(target, Value::List(_)) {
            return ObjectPropertyAccessor.source_accessor(cc, target, key);
        }
        let b = builtins();
        let (source, ty) = match key {
            KeySource::Const(PropertyKey::Index(i)) => (format!(".get({i})"), b.object.clone()),
            KeySource::Const(PropertyKey::Name(n)) if &**n == "size" => (".size()".to_string(), b.prim_long.clone()),
            KeySource::Dynamic { fragment, sample: sample @ PropertyKey::Index(_) } => {
                (format!(".get({})", dynamic_key_source(fragment, sample)), b.object.clone())
            }
            _ => return Err(SourceError::unsupported("list access needs an index or size")),
        };
        cc.narrow(Some(ty), Some(b.list.clone()));
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
        if !matches!(target, Value::List(_)) {
            return ObjectPropertyAccessor.source_setter(cc, target, key);
        }
        let source = match key {
            KeySource::Const(PropertyKey::Index(i)) => format!(".set({i}, $3)"),
            KeySource::Dynamic { fragment, sample: sample @ PropertyKey::Index(_) } => {
                format!(".set({}, $3)", dynamic_key_source(fragment, sample))
            }
            _ => return Err(SourceError::unsupported("list assignment needs an index")),
        };
        let b = builtins();
        cc.narrow(Some(b.object.clone()), Some(b.list.clone()));
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
