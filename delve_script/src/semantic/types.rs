//! Structural type model --
//!
//! Types compare by their structural name, so two independently built
//! `string<>` types are the same type. Aggregate types double as the scope of
//! their members (see [`crate::semantic::scope`]).

use std::rc::Rc;

use thiserror::Error;

use crate::host::{CallbackShape, HostProperty};
use crate::semantic::SemanticError;
use crate::semantic::scope::{Scope, ScopeRef, Symbol, SymbolRef};

pub type TypeRef = Rc<Type>;

/// Errors raised while building types from host descriptors. An unresolved
/// member rejects the whole host type.
#[derive(Debug, Clone, Error)]
pub enum TypeError {
    #[error("unresolved type '{type_name}' in {context}")]
    UnresolvedType { type_name: String, context: String },
    #[error("no function type builder registered for callback shape {shape:?}")]
    UnknownCallbackShape { shape: CallbackShape },
    #[error("callback shape {shape:?} cannot take {got} type arguments")]
    CallbackArity { shape: CallbackShape, got: usize },
    #[error("'{type_name}' is not an aggregate type")]
    NotAggregate { type_name: String },
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltIn {
    Int,
    Float,
    Bool,
    Str,
    Graph,
    /// The absent type: a function without a return type returns `none`.
    None,
}

impl BuiltIn {
    pub fn name(self) -> &'static str {
        match self {
            BuiltIn::Int => "int",
            BuiltIn::Float => "float",
            BuiltIn::Bool => "bool",
            BuiltIn::Str => "string",
            BuiltIn::Graph => "graph",
            BuiltIn::None => "none",
        }
    }
}

/// The signature of a callable: parameter types and return type.
#[derive(Debug)]
pub struct FunctionType {
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

impl FunctionType {
    /// Structural name, e.g. `fn_(task,string<>)->float`.
    pub fn type_name(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.name()).collect();
        format!("fn_({})->{}", params.join(","), self.ret.name())
    }
}

/// A named member-table type, optionally bound to a registered host type.
#[derive(Debug)]
pub struct AggregateType {
    name: String,
    /// Parent-less member scope: member resolution never escapes outward.
    members: ScopeRef,
    /// Key into the host type descriptor registry, when host-bound.
    host_key: Option<String>,
}

impl AggregateType {
    pub fn new(name: impl Into<String>, host_key: Option<String>) -> Self {
        Self { name: name.into(), members: Scope::root(), host_key }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_key(&self) -> Option<&str> {
        self.host_key.as_deref()
    }

    /// Bind a member symbol.
    ///
    /// # Errors
    /// [`SemanticError::DuplicateSymbol`] on a repeated member name.
    pub fn bind_member(&self, symbol: Symbol) -> Result<SymbolRef, SemanticError> {
        self.members.bind(symbol)
    }

    /// Resolve a member by name, without escaping to any enclosing scope.
    pub fn member(&self, name: &str) -> Option<SymbolRef> {
        self.members.resolve_local(name)
    }

    /// Members in declaration order.
    pub fn members(&self) -> Vec<SymbolRef> {
        self.members.symbols()
    }
}

/// A host extension property's type: the value type plus the registered
/// get/set capability.
#[derive(Debug)]
pub struct PropertyType {
    pub value_ty: TypeRef,
    pub property: Rc<HostProperty>,
}

#[derive(Debug)]
pub enum Type {
    BuiltIn(BuiltIn),
    List(TypeRef),
    Set(TypeRef),
    Aggregate(AggregateType),
    Function(Rc<FunctionType>),
    Property(PropertyType),
}

impl Type {
    pub fn builtin(kind: BuiltIn) -> TypeRef {
        Rc::new(Type::BuiltIn(kind))
    }

    /// Structural name; equality of types is equality of names.
    pub fn name(&self) -> String {
        match self {
            Type::BuiltIn(b) => b.name().to_string(),
            Type::List(elem) => format!("{}[]", elem.name()),
            Type::Set(elem) => format!("{}<>", elem.name()),
            Type::Aggregate(agg) => agg.name().to_string(),
            Type::Function(ft) => ft.type_name(),
            Type::Property(pt) => pt.value_ty.name(),
        }
    }

    pub fn matches(&self, other: &Type) -> bool {
        self.name() == other.name()
    }

    pub fn as_aggregate(&self) -> Option<&AggregateType> {
        match self {
            Type::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<FunctionType>> {
        match self {
            Type::Function(ft) => Some(ft),
            _ => None,
        }
    }

    pub fn is_none_type(&self) -> bool {
        matches!(self, Type::BuiltIn(BuiltIn::None))
    }
}
