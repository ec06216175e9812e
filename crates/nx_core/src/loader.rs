//! Class namespaces.
//!
//! A loader owns a set of named classes and is the identity under which
//! generated accessors are pooled. Loaders form a parent chain ending at the
//! system loader that defines the builtin classes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::builtins::builtins;
use crate::class::{ClassInfo, ClassKind, ClassRef, next_class_id};
use crate::error::ClassError;
use crate::value::{FastHashMap, fast_map_new};

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub u64);

pub struct ClassLoader {
    id: LoaderId,
    name: String,
    parent: Option<Arc<ClassLoader>>,
    reloadable: bool,
    classes: RwLock<FastHashMap<Arc<str>, ClassRef>>,
    arrays: Mutex<FastHashMap<u64, ClassRef>>,
}

impl ClassLoader {
    pub(crate) fn root(name: &str) -> Arc<Self> {
        Self::with_parent(name, None, false)
    }

    /// Loader whose parent is the system loader.
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_parent(name, Some(Self::system().clone()), false)
    }

    /// Loader whose classes may be redefined, e.g. for hot reloading.
    pub fn reloadable(name: &str) -> Arc<Self> {
        Self::with_parent(name, Some(Self::system().clone()), true)
    }

    pub fn with_parent(name: &str, parent: Option<Arc<ClassLoader>>, reloadable: bool) -> Arc<Self> {
        Arc::new(Self {
            id: LoaderId(NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_string(),
            parent,
            reloadable,
            classes: RwLock::new(fast_map_new()),
            arrays: Mutex::new(fast_map_new()),
        })
    }

    pub fn system() -> &'static Arc<ClassLoader> {
        &builtins().loader
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reloadable(&self) -> bool {
        self.reloadable
    }

    pub fn parent(&self) -> Option<&Arc<ClassLoader>> {
        self.parent.as_ref()
    }

    pub(crate) fn register(&self, class: ClassRef) -> Result<ClassRef, ClassError> {
        let mut classes = self.classes.write();
        let key: Arc<str> = Arc::from(class.name());
        if classes.contains_key(&key) && !self.reloadable {
            return Err(ClassError::Duplicate {
                name: class.name().to_string(),
                loader: self.name.clone(),
            });
        }
        classes.insert(key, class.clone());
        Ok(class)
    }

    /// Looks a class up in this loader, then in its ancestors.
    pub fn find(&self, name: &str) -> Option<ClassRef> {
        if let Some(c) = self.classes.read().get(name) {
            return Some(c.clone());
        }
        self.parent.as_ref().and_then(|p| p.find(name))
    }

    /// Classes defined directly by this loader.
    pub fn classes(&self) -> Vec<ClassRef> {
        self.classes.read().values().cloned().collect()
    }

    /// The unique array class of `component` within this loader.
    pub fn array_class(&self, component: &ClassRef) -> ClassRef {
        self.array_class_with_super(component, &builtins().object)
    }

    pub(crate) fn array_class_with_super(&self, component: &ClassRef, object: &ClassRef) -> ClassRef {
        let mut arrays = self.arrays.lock();
        arrays
            .entry(component.id())
            .or_insert_with(|| {
                ClassRef::from_info(ClassInfo {
                    id: next_class_id(),
                    name: Arc::from(format!("{}[]", component.name())),
                    kind: ClassKind::Array,
                    superclass: Some(object.clone()),
                    interfaces: Vec::new(),
                    component: Some(component.clone()),
                    fields: Vec::new(),
                    methods: Vec::new(),
                    constructors: Vec::new(),
                    statics: RwLock::new(Default::default()),
                    loader: self.id,
                    reloadable: self.reloadable,
                })
            })
            .clone()
    }
}

impl std::fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassLoader")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("reloadable", &self.reloadable)
            .finish()
    }
}
