//! Errors raised by the object model.

use thiserror::Error;

/// Failure while invoking a native method or constructor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("{method}: expected {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("{method}: argument {index} is not a {expected} (got {actual})")]
    ArgumentType {
        method: String,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("cannot invoke abstract method {0}")]
    Abstract(String),

    #[error("{0}")]
    Message(String),
}

impl InvokeError {
    pub fn msg(message: impl Into<String>) -> Self {
        InvokeError::Message(message.into())
    }
}

/// Failure while defining a class.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassError {
    #[error("class {name} is already defined by loader {loader}")]
    Duplicate { name: String, loader: String },

    #[error("{name}: superclass {superclass} is an interface")]
    SuperIsInterface { name: String, superclass: String },

    #[error("{name}: {interface} is not an interface")]
    NotAnInterface { name: String, interface: String },

    #[error("interface {0} cannot declare fields or constructors")]
    InterfaceState(String),
}
