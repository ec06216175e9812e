//! Sub-expressions hoisted out of an accessor body.
//!
//! Index keys and call arguments evaluate against the root, not against the
//! value being navigated, so the compiler moves them into helper methods
//! `refN` on the accessor class and calls those from the body.

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};

use nx_core::ClassRef;

use super::context::cast_string;
use super::fragment::{Fragment, GetCode, get_code};

#[derive(Clone)]
pub struct LocalReference {
    name: String,
    expression: String,
    ty: ClassRef,
    code: GetCode,
}

impl LocalReference {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn ty(&self) -> &ClassRef {
        &self.ty
    }

    pub fn into_method(self) -> LocalMethod {
        let widen = if self.ty.is_primitive() { "($w) " } else { "" };
        LocalMethod {
            signature: format!("public {} {}(Context $1, Object $2)", cast_string(&self.ty), self.name),
            source: format!("{{ return {widen}{};}}", self.expression),
            name: self.name,
            ret: self.ty,
            code: self.code,
        }
    }
}

impl PartialEq for LocalReference {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for LocalReference {}

impl Hash for LocalReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for LocalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.name, self.ty, self.expression)
    }
}

/// A materialized `refN` helper of an accessor class.
#[derive(Clone)]
pub struct LocalMethod {
    pub name: String,
    pub ret: ClassRef,
    /// Declaration text for diagnostics; not executed.
    pub signature: String,
    pub source: String,
    pub code: GetCode,
}

#[derive(Default)]
pub struct LocalReferenceTable {
    counter: usize,
    pending: VecDeque<LocalReference>,
}

impl LocalReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `expression` as `ref{n}` and returns the call-site fragment
    /// that replaces it in the body.
    pub fn create(&mut self, expression: &str, ty: &ClassRef, code: GetCode) -> Fragment {
        let index = self.counter;
        self.counter += 1;
        let name = format!("ref{index}");
        let source = if ty.is_primitive() {
            format!("{name}($$)")
        } else {
            format!("(({}){name}($$))", cast_string(ty))
        };
        self.pending.push_back(LocalReference {
            name,
            expression: expression.to_string(),
            ty: ty.clone(),
            code,
        });
        // The cast in the source is static only; consumers of the value
        // dispatch on its runtime class.
        Fragment::new(source, get_code(move |frame, _| frame.local(index)))
    }

    /// References created so far, drained or not.
    pub fn created(&self) -> usize {
        self.counter
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes pending references in creation order. `f` may create new
    /// references; they are drained in the same pass.
    pub fn drain_with<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Self, LocalReference),
    {
        while let Some(r) = self.pending.pop_front() {
            f(self, r);
        }
    }

    pub fn drain_methods(&mut self) -> Vec<LocalMethod> {
        let mut out = Vec::with_capacity(self.pending.len());
        self.drain_with(|_, r| out.push(r.into_method()));
        out
    }
}
