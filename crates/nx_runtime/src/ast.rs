//! Expression trees.
//!
//! Nodes are shared (`NodeRef`) so a compiled accessor can keep a handle on
//! the node it delegates to. Each node carries a slot for its compiled
//! accessor which is written at most once.

use std::fmt;
use std::sync::{Arc, OnceLock};

use nx_core::Value;

use crate::compiler::NodeAccessor;

pub type NodeRef = Arc<Node>;

#[derive(Clone)]
pub enum NodeKind {
    Const(Value),
    /// Named property of the current target.
    Property(Arc<str>),
    /// `[key]` access on the current target; the key evaluates against the root.
    Index(NodeRef),
    /// Method call on the current target; arguments evaluate against the root.
    Method { name: Arc<str>, args: Vec<NodeRef> },
    Chain(Vec<NodeRef>),
    RootVar,
    ThisVar,
    Var(Arc<str>),
    StaticField { class: Arc<str>, field: Arc<str> },
    StaticMethod { class: Arc<str>, name: Arc<str>, args: Vec<NodeRef> },
    Ctor { class: Arc<str>, args: Vec<NodeRef> },
    Not(NodeRef),
    And(NodeRef, NodeRef),
    Or(NodeRef, NodeRef),
    Eq(NodeRef, NodeRef),
    /// Comma-separated expressions; the value is the last one's.
    Sequence(Vec<NodeRef>),
}

pub struct Node {
    kind: NodeKind,
    accessor: OnceLock<Arc<dyn NodeAccessor>>,
}

impl Node {
    pub fn new(kind: NodeKind) -> NodeRef {
        Arc::new(Node {
            kind,
            accessor: OnceLock::new(),
        })
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn accessor(&self) -> Option<&Arc<dyn NodeAccessor>> {
        self.accessor.get()
    }

    /// Publishes the compiled accessor. Returns false, leaving the existing
    /// accessor in place, if one was already bound.
    pub fn set_accessor(&self, accessor: Arc<dyn NodeAccessor>) -> bool {
        self.accessor.set(accessor).is_ok()
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, NodeKind::Const(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Not(_) | NodeKind::And(..) | NodeKind::Or(..) | NodeKind::Eq(..)
        )
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, NodeKind::StaticField { .. } | NodeKind::StaticMethod { .. })
    }

    pub fn is_root_var(&self) -> bool {
        matches!(self.kind, NodeKind::RootVar)
    }

    pub fn is_ctor(&self) -> bool {
        matches!(self.kind, NodeKind::Ctor { .. })
    }

    /// Statement-sequencing split: everything but the last expression.
    pub fn core_expressions(&self) -> Option<&[NodeRef]> {
        match &self.kind {
            NodeKind::Sequence(items) if items.len() > 1 => Some(&items[..items.len() - 1]),
            _ => None,
        }
    }

    pub fn last_expression(&self) -> Option<&NodeRef> {
        match &self.kind {
            NodeKind::Sequence(items) if items.len() > 1 => items.last(),
            _ => None,
        }
    }

    /// Short kind label, used to name generated accessor classes.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Const(_) => "Const",
            NodeKind::Property(_) => "Property",
            NodeKind::Index(_) => "Index",
            NodeKind::Method { .. } => "Method",
            NodeKind::Chain(_) => "Chain",
            NodeKind::RootVar => "RootVarRef",
            NodeKind::ThisVar => "ThisVarRef",
            NodeKind::Var(_) => "VarRef",
            NodeKind::StaticField { .. } => "StaticField",
            NodeKind::StaticMethod { .. } => "StaticMethod",
            NodeKind::Ctor { .. } => "Ctor",
            NodeKind::Not(_) => "Not",
            NodeKind::And(..) => "And",
            NodeKind::Or(..) => "Or",
            NodeKind::Eq(..) => "Eq",
            NodeKind::Sequence(_) => "Sequence",
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
    match v {
        Value::Str(s) => write!(f, "{s:?}"),
        other => write!(f, "{other}"),
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[NodeRef]) -> fmt::Result {
    f.write_str("(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{a}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Const(v) => write_literal(f, v),
            NodeKind::Property(name) => f.write_str(name),
            NodeKind::Index(key) => write!(f, "[{key}]"),
            NodeKind::Method { name, args } => {
                f.write_str(name)?;
                write_args(f, args)
            }
            NodeKind::Chain(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 && !matches!(item.kind, NodeKind::Index(_)) {
                        f.write_str(".")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            NodeKind::RootVar => f.write_str("#root"),
            NodeKind::ThisVar => f.write_str("#this"),
            NodeKind::Var(name) => write!(f, "#{name}"),
            NodeKind::StaticField { class, field } => write!(f, "@{class}@{field}"),
            NodeKind::StaticMethod { class, name, args } => {
                write!(f, "@{class}@{name}")?;
                write_args(f, args)
            }
            NodeKind::Ctor { class, args } => {
                write!(f, "new {class}")?;
                write_args(f, args)
            }
            NodeKind::Not(inner) => write!(f, "!{inner}"),
            NodeKind::And(l, r) => write!(f, "({l} && {r})"),
            NodeKind::Or(l, r) => write!(f, "({l} || {r})"),
            NodeKind::Eq(l, r) => write!(f, "({l} == {r})"),
            NodeKind::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({self}")?;
        if let Some(acc) = self.accessor() {
            write!(f, " => {}", acc.class_name())?;
        }
        f.write_str(")")
    }
}

pub fn constant(value: impl Into<Value>) -> NodeRef {
    Node::new(NodeKind::Const(value.into()))
}

pub fn null() -> NodeRef {
    Node::new(NodeKind::Const(Value::Null))
}

pub fn property(name: &str) -> NodeRef {
    Node::new(NodeKind::Property(Arc::from(name)))
}

pub fn index(key: NodeRef) -> NodeRef {
    Node::new(NodeKind::Index(key))
}

pub fn method(name: &str, args: Vec<NodeRef>) -> NodeRef {
    Node::new(NodeKind::Method {
        name: Arc::from(name),
        args,
    })
}

pub fn chain(items: Vec<NodeRef>) -> NodeRef {
    Node::new(NodeKind::Chain(items))
}

/// `a.b.c` as a chain of property nodes.
pub fn path(dotted: &str) -> NodeRef {
    let items: Vec<NodeRef> = dotted.split('.').map(property).collect();
    if items.len() == 1 {
        return items.into_iter().next().unwrap_or_else(null);
    }
    chain(items)
}

pub fn root() -> NodeRef {
    Node::new(NodeKind::RootVar)
}

pub fn this() -> NodeRef {
    Node::new(NodeKind::ThisVar)
}

pub fn var(name: &str) -> NodeRef {
    Node::new(NodeKind::Var(Arc::from(name)))
}

pub fn static_field(class: &str, field: &str) -> NodeRef {
    Node::new(NodeKind::StaticField {
        class: Arc::from(class),
        field: Arc::from(field),
    })
}

pub fn static_method(class: &str, name: &str, args: Vec<NodeRef>) -> NodeRef {
    Node::new(NodeKind::StaticMethod {
        class: Arc::from(class),
        name: Arc::from(name),
        args,
    })
}

pub fn ctor(class: &str, args: Vec<NodeRef>) -> NodeRef {
    Node::new(NodeKind::Ctor {
        class: Arc::from(class),
        args,
    })
}

pub fn not(inner: NodeRef) -> NodeRef {
    Node::new(NodeKind::Not(inner))
}

pub fn and(l: NodeRef, r: NodeRef) -> NodeRef {
    Node::new(NodeKind::And(l, r))
}

pub fn or(l: NodeRef, r: NodeRef) -> NodeRef {
    Node::new(NodeKind::Or(l, r))
}

pub fn eq(l: NodeRef, r: NodeRef) -> NodeRef {
    Node::new(NodeKind::Eq(l, r))
}

pub fn sequence(items: Vec<NodeRef>) -> NodeRef {
    Node::new(NodeKind::Sequence(items))
}
