//! Runtime: script values, memory spaces, the interpreter, and the callback
//! adapters that let host code invoke script functions.

pub mod callback;
pub mod interpreter;
pub mod value;

pub use callback::{CallbackAdapter, CallbackHandle, build_adapter};
pub use interpreter::Interpreter;
pub use value::{AggregateValue, MemorySpace, MemorySpaceRef, Value};

use thiserror::Error;

use crate::host::HostAccessError;

/// Errors raised during interpretation.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("unknown callable '{name}'")]
    UnknownCallable { name: String },
    #[error("type mismatch in {context}: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String, context: String },
    #[error("'{name}' expects {expected} arguments, got {got}")]
    ArityMismatch { name: String, expected: usize, got: usize },
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },
    #[error("value of type {type_name} has no member '{member}'")]
    NoSuchMember { type_name: String, member: String },
    #[error("cannot apply '{op}' to {lhs} and {rhs}")]
    InvalidOperands { op: &'static str, lhs: String, rhs: String },
    #[error("value of type {0} is not iterable")]
    NotIterable(String),
    #[error("no script translation for host value of type '{0}'")]
    Untranslatable(String),
    #[error("cannot instantiate value of type {0} as a host value")]
    NotInstantiable(String),
    #[error("no callback adapter fits a {params}-parameter {kind} function")]
    AdapterShape { params: usize, kind: &'static str },
    #[error(transparent)]
    Host(#[from] HostAccessError),
}
