//! Fluent class registration.
//!
//! This is the explicit member registry that stands in for runtime
//! reflection: every field, method and constructor a class exposes is
//! declared here together with its native body.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::builtins::builtins;
use crate::class::{
    ClassInfo, ClassKind, ClassRef, ConstructorInfo, FieldInfo, MethodInfo, next_class_id,
};
use crate::error::{ClassError, InvokeError};
use crate::loader::ClassLoader;
use crate::value::{Instance, Value};

pub struct ClassBuilder {
    name: Arc<str>,
    kind: ClassKind,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    constructors: Vec<ConstructorInfo>,
    static_values: Vec<(Arc<str>, Value)>,
}

impl ClassBuilder {
    fn new(name: &str, kind: ClassKind) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            static_values: Vec::new(),
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, ClassKind::Class)
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name, ClassKind::Interface)
    }

    pub(crate) fn primitive(name: &str) -> Self {
        Self::new(name, ClassKind::Primitive)
    }

    pub fn extends(mut self, superclass: &ClassRef) -> Self {
        self.superclass = Some(superclass.clone());
        self
    }

    pub fn implements(mut self, interface: &ClassRef) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Public instance field.
    pub fn field(self, name: &str, ty: &ClassRef) -> Self {
        self.push_field(name, ty, false, true)
    }

    /// Instance field that is only reachable through accessor methods.
    pub fn private_field(self, name: &str, ty: &ClassRef) -> Self {
        self.push_field(name, ty, false, false)
    }

    pub fn static_field(mut self, name: &str, ty: &ClassRef, initial: Value) -> Self {
        self.static_values.push((Arc::from(name), initial));
        self.push_field(name, ty, true, true)
    }

    fn push_field(mut self, name: &str, ty: &ClassRef, is_static: bool, is_public: bool) -> Self {
        self.fields.push(FieldInfo {
            name: Arc::from(name),
            ty: ty.clone(),
            is_static,
            is_public,
        });
        self
    }

    pub fn method<F>(self, name: &str, params: &[ClassRef], ret: &ClassRef, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        self.push_method(name, params, ret, false, Some(Arc::new(body)))
    }

    pub fn abstract_method(self, name: &str, params: &[ClassRef], ret: &ClassRef) -> Self {
        self.push_method(name, params, ret, false, None)
    }

    pub fn static_method<F>(self, name: &str, params: &[ClassRef], ret: &ClassRef, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        self.push_method(name, params, ret, true, Some(Arc::new(body)))
    }

    fn push_method(
        mut self,
        name: &str,
        params: &[ClassRef],
        ret: &ClassRef,
        is_static: bool,
        body: Option<crate::class::NativeMethod>,
    ) -> Self {
        self.methods.push(MethodInfo {
            name: Arc::from(name),
            params: params.to_vec(),
            ret: ret.clone(),
            is_static,
            is_public: true,
            body,
        });
        self
    }

    pub fn constructor<F>(mut self, params: &[ClassRef], body: F) -> Self
    where
        F: Fn(&ClassRef, &[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        self.constructors.push(ConstructorInfo {
            params: params.to_vec(),
            body: Arc::new(body),
        });
        self
    }

    /// No-argument constructor producing an instance with default field values.
    pub fn default_constructor(self) -> Self {
        self.constructor(&[], |class, _| Ok(Value::Object(Arc::new(Instance::new(class)))))
    }

    /// Defines the class in `loader`. Classes without an explicit superclass
    /// extend `Object`.
    pub fn build(self, loader: &ClassLoader) -> Result<ClassRef, ClassError> {
        let default_super = match self.kind {
            ClassKind::Class => Some(builtins().object.clone()),
            _ => None,
        };
        self.build_with(loader, default_super)
    }

    pub(crate) fn build_with(
        mut self,
        loader: &ClassLoader,
        default_super: Option<ClassRef>,
    ) -> Result<ClassRef, ClassError> {
        if self.superclass.is_none() && self.kind == ClassKind::Class {
            self.superclass = default_super;
        }
        if let Some(sup) = &self.superclass {
            if sup.is_interface() {
                return Err(ClassError::SuperIsInterface {
                    name: self.name.to_string(),
                    superclass: sup.name().to_string(),
                });
            }
            if self.kind == ClassKind::Interface {
                return Err(ClassError::SuperIsInterface {
                    name: self.name.to_string(),
                    superclass: sup.name().to_string(),
                });
            }
        }
        if let Some(bad) = self.interfaces.iter().find(|i| !i.is_interface()) {
            return Err(ClassError::NotAnInterface {
                name: self.name.to_string(),
                interface: bad.name().to_string(),
            });
        }
        if self.kind == ClassKind::Interface
            && (self.fields.iter().any(|f| !f.is_static) || !self.constructors.is_empty())
        {
            return Err(ClassError::InterfaceState(self.name.to_string()));
        }

        let mut statics: IndexMap<Arc<str>, Value> = IndexMap::new();
        for f in self.fields.iter().filter(|f| f.is_static) {
            statics.insert(f.name.clone(), Value::default_for(&f.ty));
        }
        for (name, value) in self.static_values {
            statics.insert(name, value);
        }

        let class = ClassRef::from_info(ClassInfo {
            id: next_class_id(),
            name: self.name,
            kind: self.kind,
            superclass: self.superclass,
            interfaces: self.interfaces,
            component: None,
            fields: self.fields,
            methods: self.methods,
            constructors: self.constructors,
            statics: RwLock::new(statics),
            loader: loader.id(),
            reloadable: loader.is_reloadable(),
        });
        loader.register(class)
    }
}
