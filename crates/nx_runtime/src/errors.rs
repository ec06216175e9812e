//! Error types for evaluation, caching and compilation.

use nx_core::InvokeError;
use thiserror::Error;

/// Common error message constants.
pub mod messages {
    pub const CONSTANT_NOT_ASSIGNABLE: &str = "can't assign a value to a constant";
    pub const NOT_ASSIGNABLE: &str = "expression is not assignable";
    pub const NULL_SETTER_BODY: &str = "can't compile a null setter body";
    pub const NULL_ROOT_SETTER: &str = "can't compile setters with a null root object";
    pub const NULL_TARGET: &str = "can't compile against a null target";
}

/// A metadata factory failed; nothing was cached for the key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache entry for {key} could not be created: {reason}")]
    Factory { key: String, reason: String },
}

impl CacheError {
    pub fn factory(key: impl std::fmt::Debug, reason: impl Into<String>) -> Self {
        CacheError::Factory {
            key: format!("{key:?}"),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("source is null for getProperty(null, \"{0}\")")]
    NullSource(String),

    #[error("no property {name} on {class}")]
    NoSuchProperty { class: String, name: String },

    #[error("property {name} on {class} is read-only")]
    ReadOnly { class: String, name: String },

    #[error("no method {name} on {class} accepts {argc} argument(s)")]
    NoSuchMethod {
        class: String,
        name: String,
        argc: usize,
    },

    #[error("no constructor of {class} accepts {argc} argument(s)")]
    NoSuchConstructor { class: String, argc: usize },

    #[error("no {kind} accessor registered for {class}")]
    NoHandler { kind: &'static str, class: String },

    #[error("{0}")]
    NotAssignable(String),

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("{key} is not a valid key for {class}")]
    InvalidKey { class: String, key: String },

    #[error("{found} cannot be cast to {expected}")]
    Incompatible { expected: String, found: String },

    #[error("unknown class {0}")]
    UnknownClass(String),

    #[error("generated accessor has no local reference {0}")]
    MissingLocal(usize),

    #[error("compiled accessor outlived its expression")]
    Detached,

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Outcome of asking a node or accessor for generated source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The sub-expression cannot be reduced to generated code; the compiler
    /// delegates to the interpreter instead.
    #[error("unsupported compilation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl SourceError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        SourceError::Unsupported(reason.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, SourceError::Unsupported(_))
    }
}

/// The code generation backend rejected an accessor class.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{class}.{method}: {reason}")]
    InvalidSource {
        class: String,
        method: String,
        reason: String,
    },

    #[error("{class} could not be instantiated: {reason}")]
    Instantiation { class: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum CompileCause {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Fatal compilation failure with everything needed to reproduce it.
#[derive(Debug, Clone, Error)]
#[error("unable to compile `{expression}` against root {root}: {cause}")]
pub struct CompileError {
    pub root: String,
    pub expression: String,
    pub get_source: String,
    pub set_source: String,
    #[source]
    pub cause: CompileCause,
}
