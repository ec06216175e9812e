//! Per-class member metadata.
//!
//! Building a method, field or property table walks the whole class
//! hierarchy, so each table is computed once per class and kept in a
//! `KeyedCache` until `clear`, unless the class cache inspector rejects the
//! class.

use std::sync::Arc;

use indexmap::IndexMap;
use nx_core::{ClassRef, FieldInfo, MethodInfo, Value};
use parking_lot::RwLock;

use crate::cache::{CacheError, CacheInspector, CacheStrategy, KeyedCache, SharedFactory};
use crate::errors::EvalError;

#[derive(Clone, Debug)]
pub struct ResolvedMethod {
    pub declaring: ClassRef,
    pub info: MethodInfo,
}

#[derive(Clone)]
pub struct ResolvedField {
    pub declaring: ClassRef,
    pub info: FieldInfo,
}

#[derive(Default)]
pub struct MethodTable {
    by_name: IndexMap<Arc<str>, Vec<Arc<ResolvedMethod>>>,
}

impl MethodTable {
    /// Overloads of `name`, most specific declaration first.
    pub fn get(&self, name: &str) -> &[Arc<ResolvedMethod>] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, name: &str, args: &[Value], is_static: bool) -> Option<Arc<ResolvedMethod>> {
        self.get(name)
            .iter()
            .find(|m| m.info.is_static == is_static && m.info.accepts(args))
            .cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|k| &**k)
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[derive(Default)]
pub struct FieldTable {
    by_name: IndexMap<Arc<str>, Arc<ResolvedField>>,
}

impl FieldTable {
    pub fn get(&self, name: &str) -> Option<&Arc<ResolvedField>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[derive(Clone)]
pub enum PropertyRead {
    Getter(Arc<ResolvedMethod>),
    Field(Arc<ResolvedField>),
}

#[derive(Clone)]
pub enum PropertyWrite {
    Setter(Arc<ResolvedMethod>),
    Field(Arc<ResolvedField>),
}

pub struct PropertyDescriptor {
    pub name: Arc<str>,
    pub ty: ClassRef,
    pub read: Option<PropertyRead>,
    pub write: Option<PropertyWrite>,
}

impl PropertyDescriptor {
    pub fn is_readable(&self) -> bool {
        self.read.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }

    /// Class declaring the read member, falling back to the write member.
    pub fn declaring(&self) -> Option<&ClassRef> {
        match (&self.read, &self.write) {
            (Some(PropertyRead::Getter(m)), _) => Some(&m.declaring),
            (Some(PropertyRead::Field(f)), _) => Some(&f.declaring),
            (None, Some(PropertyWrite::Setter(m))) => Some(&m.declaring),
            (None, Some(PropertyWrite::Field(f))) => Some(&f.declaring),
            (None, None) => None,
        }
    }

    pub fn write_declaring(&self) -> Option<&ClassRef> {
        match &self.write {
            Some(PropertyWrite::Setter(m)) => Some(&m.declaring),
            Some(PropertyWrite::Field(f)) => Some(&f.declaring),
            None => None,
        }
    }

    pub fn read_source(&self) -> String {
        match &self.read {
            Some(PropertyRead::Getter(m)) => format!(".{}()", m.info.name),
            Some(PropertyRead::Field(f)) => format!(".{}", f.info.name),
            None => String::new(),
        }
    }

    pub fn write_source(&self, value: &str) -> String {
        match &self.write {
            Some(PropertyWrite::Setter(m)) => format!(".{}({value})", m.info.name),
            Some(PropertyWrite::Field(f)) => format!(".{} = {value}", f.info.name),
            None => String::new(),
        }
    }

    pub fn read_value(&self, target: &Value) -> Result<Value, EvalError> {
        match &self.read {
            Some(PropertyRead::Getter(m)) => Ok(m.info.invoke(target, &[])?),
            Some(PropertyRead::Field(f)) => target
                .as_object()
                .and_then(|o| o.get_field(&f.info.name))
                .ok_or_else(|| self.missing(target)),
            None => Err(self.missing(target)),
        }
    }

    pub fn write_value(&self, target: &Value, value: Value) -> Result<(), EvalError> {
        match &self.write {
            Some(PropertyWrite::Setter(m)) => {
                m.info.invoke(target, &[value])?;
                Ok(())
            }
            Some(PropertyWrite::Field(f)) => match target.as_object() {
                Some(o) if o.set_field(&f.info.name, value) => Ok(()),
                _ => Err(self.missing(target)),
            },
            None => Err(EvalError::ReadOnly {
                class: target.type_name(),
                name: self.name.to_string(),
            }),
        }
    }

    fn missing(&self, target: &Value) -> EvalError {
        EvalError::NoSuchProperty {
            class: target.type_name(),
            name: self.name.to_string(),
        }
    }
}

#[derive(Default)]
pub struct PropertyTable {
    by_name: IndexMap<Arc<str>, Arc<PropertyDescriptor>>,
}

impl PropertyTable {
    pub fn get(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|k| &**k)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// The class, its superclasses, then every interface reachable from them,
/// each listed once.
pub fn linearize(class: &ClassRef) -> Vec<ClassRef> {
    let mut out: Vec<ClassRef> = Vec::new();
    let mut cur = Some(class.clone());
    while let Some(c) = cur {
        cur = c.superclass().cloned();
        out.push(c);
    }
    let mut pending: Vec<ClassRef> = out.iter().flat_map(|c| c.interfaces().iter().cloned()).collect();
    pending.reverse();
    while let Some(iface) = pending.pop() {
        if out.contains(&iface) {
            continue;
        }
        for sup in iface.interfaces().iter().rev() {
            pending.push(sup.clone());
        }
        out.push(iface);
    }
    out
}

fn build_methods(class: &ClassRef) -> MethodTable {
    let mut by_name: IndexMap<Arc<str>, Vec<Arc<ResolvedMethod>>> = IndexMap::new();
    for c in linearize(class) {
        for m in c.declared_methods().iter().filter(|m| m.is_public) {
            let overloads = by_name.entry(m.name.clone()).or_default();
            if overloads.iter().any(|r| r.info.same_signature(m)) {
                continue;
            }
            overloads.push(Arc::new(ResolvedMethod {
                declaring: c.clone(),
                info: m.clone(),
            }));
        }
    }
    MethodTable { by_name }
}

fn build_fields(class: &ClassRef) -> FieldTable {
    let mut by_name = IndexMap::new();
    for c in linearize(class) {
        for f in c.declared_fields() {
            by_name.entry(f.name.clone()).or_insert_with(|| {
                Arc::new(ResolvedField {
                    declaring: c.clone(),
                    info: f.clone(),
                })
            });
        }
    }
    FieldTable { by_name }
}

/// `getFooBar` -> `fooBar`, `URL` stays `URL`.
fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    if chars.next().is_some_and(|c| c.is_uppercase()) && first.is_uppercase() {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    out.extend(first.to_lowercase());
    out.push_str(&s[first.len_utf8()..]);
    out
}

fn accessor_suffix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    rest.chars().next().filter(|c| c.is_uppercase()).map(|_| rest)
}

fn build_properties(class: &ClassRef, methods: &MethodTable, fields: &FieldTable) -> PropertyTable {
    struct Draft {
        ty: Option<ClassRef>,
        read: Option<PropertyRead>,
        write: Option<PropertyWrite>,
    }
    let b = nx_core::builtins();
    let mut drafts: IndexMap<Arc<str>, Draft> = IndexMap::new();

    for overloads in methods.by_name.values() {
        for m in overloads.iter().filter(|m| !m.info.is_static) {
            let info = &m.info;
            if info.params.is_empty() && !info.ret.ptr_eq(&b.prim_void) {
                let prop = accessor_suffix(&info.name, "get").or_else(|| {
                    accessor_suffix(&info.name, "is").filter(|_| info.ret.boxed().ptr_eq(&b.boolean))
                });
                if let Some(prop) = prop {
                    let d = drafts.entry(Arc::from(decapitalize(prop))).or_insert(Draft {
                        ty: None,
                        read: None,
                        write: None,
                    });
                    if d.read.is_none() {
                        d.ty = Some(info.ret.clone());
                        d.read = Some(PropertyRead::Getter(m.clone()));
                    }
                }
            } else if info.params.len() == 1 {
                if let Some(prop) = accessor_suffix(&info.name, "set") {
                    let d = drafts.entry(Arc::from(decapitalize(prop))).or_insert(Draft {
                        ty: None,
                        read: None,
                        write: None,
                    });
                    let matches_getter = d.ty.as_ref().is_none_or(|t| t.ptr_eq(&info.params[0]));
                    if d.write.is_none() && matches_getter {
                        d.write = Some(PropertyWrite::Setter(m.clone()));
                    }
                }
            }
        }
    }

    for (name, f) in fields.by_name.iter() {
        if f.info.is_static || !f.info.is_public {
            continue;
        }
        let d = drafts.entry(name.clone()).or_insert(Draft {
            ty: None,
            read: None,
            write: None,
        });
        if d.read.is_none() {
            d.read = Some(PropertyRead::Field(f.clone()));
        }
        if d.write.is_none() {
            d.write = Some(PropertyWrite::Field(f.clone()));
        }
    }

    let by_name = drafts
        .into_iter()
        .map(|(name, d)| {
            let ty = d
                .ty
                .or_else(|| match &d.write {
                    Some(PropertyWrite::Setter(m)) => m.info.params.first().cloned(),
                    _ => None,
                })
                .or_else(|| match (&d.read, &d.write) {
                    (Some(PropertyRead::Field(f)), _) | (_, Some(PropertyWrite::Field(f))) => {
                        Some(f.info.ty.clone())
                    }
                    _ => None,
                })
                .unwrap_or_else(|| b.object.clone());
            let desc = PropertyDescriptor {
                name: name.clone(),
                ty,
                read: d.read,
                write: d.write,
            };
            (name, Arc::new(desc))
        })
        .collect();
    tracing::trace!(class = %class, "built property table");
    PropertyTable { by_name }
}

fn build_property_table(class: &ClassRef) -> PropertyTable {
    build_properties(class, &build_methods(class), &build_fields(class))
}

type TableCache<T> = Box<dyn KeyedCache<ClassRef, Arc<T>> + Send + Sync>;

pub struct MemberCache {
    methods: TableCache<MethodTable>,
    fields: TableCache<FieldTable>,
    properties: TableCache<PropertyTable>,
    inspector: RwLock<Option<Arc<dyn CacheInspector>>>,
}

fn factory<T, F>(build: F) -> Option<SharedFactory<ClassRef, Arc<T>>>
where
    T: Send + Sync + 'static,
    F: Fn(&ClassRef) -> T + Send + Sync + 'static,
{
    Some(Arc::new(move |class: &ClassRef| -> Result<Arc<T>, CacheError> {
        Ok(Arc::new(build(class)))
    }))
}

fn expect_entry<T>(class: &ClassRef, entry: Result<Option<T>, CacheError>) -> Result<T, EvalError> {
    entry?.ok_or_else(|| EvalError::Cache(CacheError::factory(class, "no factory installed")))
}

impl MemberCache {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self {
            methods: strategy.build(factory(build_methods)),
            fields: strategy.build(factory(build_fields)),
            properties: strategy.build(factory(build_property_table)),
            inspector: RwLock::new(None),
        }
    }

    /// Classes the inspector rejects get freshly built tables that are
    /// never stored. Entries cached before installation are kept.
    pub fn set_inspector(&self, inspector: Option<Arc<dyn CacheInspector>>) {
        *self.inspector.write() = inspector;
    }

    fn vetoed(&self, class: &ClassRef) -> bool {
        self.inspector.read().as_ref().is_some_and(|i| !i.should_cache(class))
    }

    pub fn methods(&self, class: &ClassRef) -> Result<Arc<MethodTable>, EvalError> {
        if self.vetoed(class) {
            return Ok(Arc::new(build_methods(class)));
        }
        expect_entry(class, self.methods.get(class))
    }

    pub fn fields(&self, class: &ClassRef) -> Result<Arc<FieldTable>, EvalError> {
        if self.vetoed(class) {
            return Ok(Arc::new(build_fields(class)));
        }
        expect_entry(class, self.fields.get(class))
    }

    pub fn properties(&self, class: &ClassRef) -> Result<Arc<PropertyTable>, EvalError> {
        if self.vetoed(class) {
            return Ok(Arc::new(build_property_table(class)));
        }
        expect_entry(class, self.properties.get(class))
    }

    pub fn property(&self, class: &ClassRef, name: &str) -> Result<Option<Arc<PropertyDescriptor>>, EvalError> {
        Ok(self.properties(class)?.get(name).cloned())
    }

    pub fn find_method(
        &self,
        class: &ClassRef,
        name: &str,
        args: &[Value],
        is_static: bool,
    ) -> Result<Option<Arc<ResolvedMethod>>, EvalError> {
        Ok(self.methods(class)?.find(name, args, is_static))
    }

    /// Number of classes with cached tables, per table kind.
    pub fn cached_classes(&self) -> (usize, usize, usize) {
        (self.methods.len(), self.fields.len(), self.properties.len())
    }

    pub fn clear(&self) {
        self.methods.clear();
        self.fields.clear();
        self.properties.clear();
    }
}
