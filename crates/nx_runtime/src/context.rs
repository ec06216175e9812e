//! Evaluation context threaded through interpretation and compiled accessors.

use std::sync::Arc;

use nx_core::{ClassLoader, ClassRef, FastHashMap, Value, fast_map_new};

use crate::errors::EvalError;
use crate::runtime::Runtime;

pub struct EvalContext {
    runtime: Arc<Runtime>,
    root: Value,
    vars: FastHashMap<Arc<str>, Value>,
    loader: Arc<ClassLoader>,
}

impl EvalContext {
    pub fn new(runtime: Arc<Runtime>, root: Value) -> Self {
        Self {
            runtime,
            root,
            vars: fast_map_new(),
            loader: ClassLoader::system().clone(),
        }
    }

    /// Resolves class names for static and constructor expressions through `loader`.
    pub fn with_loader(mut self, loader: Arc<ClassLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set_root(&mut self, root: Value) {
        self.root = root;
    }

    pub fn loader(&self) -> &Arc<ClassLoader> {
        &self.loader
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(Arc::from(name), value);
    }

    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn find_class(&self, name: &str) -> Result<ClassRef, EvalError> {
        self.loader
            .find(name)
            .ok_or_else(|| EvalError::UnknownClass(name.to_string()))
    }
}
