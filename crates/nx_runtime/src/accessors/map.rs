use std::sync::Arc;

use nx_core::{Value, builtins};

use super::{KeySource, ObjectPropertyAccessor, PropertyAccessor, PropertyKey, dynamic_key_source};
use crate::compiler::{CompilationContext, Fragment, Frame, SetFragment};
use crate::context::EvalContext;
use crate::errors::{EvalError, SourceError};

/// Map entries by key. A missing key reads as null unless it names one of
/// the pseudo-properties `size`, `isEmpty`, `keys` or `values`.
pub struct MapPropertyAccessor;

fn map_get(target: &Value, key: &PropertyKey) -> Option<Value> {
    let Value::Map(map) = target else {
        return None;
    };
    let name = key.as_name();
    let map = map.read();
    if let Some(v) = map.get(&name) {
        return Some(v.clone());
    }
    Some(match &*name {
        "size" => Value::Int(map.len() as i64),
        "isEmpty" => Value::Bool(map.is_empty()),
        "keys" => Value::list(map.keys().map(|k| Value::Str(k.clone())).collect()),
        "values" => Value::list(map.values().cloned().collect()),
        _ => Value::Null,
    })
}

fn read(frame: &mut Frame<'_>, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
    match map_get(target, key) {
        Some(v) => Ok(v),
        None => {
            let rt = frame.runtime();
            rt.get_property(frame.ctx(), target, key)
        }
    }
}

impl PropertyAccessor for MapPropertyAccessor {
    fn get_property(&self, ctx: &mut EvalContext, target: &Value, key: &PropertyKey) -> Result<Value, EvalError> {
        match map_get(target, key) {
            Some(v) => Ok(v),
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
        match target {
            Value::Map(map) => {
                map.write().insert(key.as_name(), value);
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
        if !matches!(target, Value::Map(_)) {
            return ObjectPropertyAccessor.source_accessor(cc, target, key);
        }
        let b = builtins();
        cc.narrow(Some(b.object.clone()), Some(b.map.clone()));
        Ok(match key.clone() {
            KeySource::Const(k) => {
                let name: Arc<str> = k.as_name();
                Fragment::from_fn(format!(".get({:?})", &*name), move |frame, t| read(frame, t, &k))
            }
            KeySource::Dynamic { fragment, sample } => {
                let source = format!(".get({})", dynamic_key_source(&fragment, &sample));
                Fragment::from_fn(source, move |frame, t| {
                    let k = PropertyKey::from_value(&(fragment.code)(frame, t)?)?;
                    read(frame, t, &k)
                })
            }
        })
    }

    fn source_setter(
        &self,
        cc: &mut CompilationContext<'_>,
        target: &Value,
        key: &KeySource,
    ) -> Result<SetFragment, SourceError> {
        if !matches!(target, Value::Map(_)) {
            return ObjectPropertyAccessor.source_setter(cc, target, key);
        }
        let source = match key {
            KeySource::Const(k) => format!(".put({:?}, $3)", &*k.as_name()),
            KeySource::Dynamic { fragment, sample } => format!(".put({}, $3)", dynamic_key_source(fragment, sample)),
        };
        let b = builtins();
        cc.narrow(Some(b.object.clone()), Some(b.map.clone()));
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
