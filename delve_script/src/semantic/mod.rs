//! Semantic analysis: scopes, symbols, the structural type model, and the
//! program walk that binds and checks a file before interpretation.

pub mod analyzer;
pub mod scope;
pub mod type_builder;
pub mod types;

pub use analyzer::{Analysis, analyze};
pub use scope::{Callable, FunctionSymbol, NativeFunction, Scope, ScopeRef, Symbol, SymbolKind, SymbolRef};
pub use type_builder::TypeBuilder;
pub use types::{AggregateType, BuiltIn, FunctionType, Type, TypeError, TypeRef};

use thiserror::Error;

/// Errors raised while binding and resolving symbols.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("symbol '{name}' is already bound in this scope")]
    DuplicateSymbol { name: String },
    #[error("unknown symbol '{name}' (line {src_line})")]
    UnknownSymbol { name: String, src_line: usize },
    #[error("'{name}' does not name a type (line {src_line})")]
    NotAType { name: String, src_line: usize },
    #[error("'{name}' is not an aggregate type (line {src_line})")]
    NotAggregate { name: String, src_line: usize },
}
