//! Scopes and symbols --
//!
//! A `Scope` owns an insertion-ordered symbol table and an optional parent.
//! Binding a name twice in the same scope fails; shadowing a name from an
//! enclosing scope is allowed. Aggregate types carry their own parent-less
//! scope for members, so member resolution never escapes outward.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FuncDef;
use crate::runtime::RuntimeError;
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::Value;
use crate::semantic::SemanticError;
use crate::semantic::types::{FunctionType, TypeRef};

pub type ScopeRef = Rc<Scope>;
pub type SymbolRef = Rc<Symbol>;

/// Host closure backing a native function.
pub type NativeFn = Rc<dyn Fn(&Interpreter, Vec<Value>) -> Result<Value, RuntimeError>>;

/// A user-defined function bound during analysis.
#[derive(Debug)]
pub struct FunctionSymbol {
    pub name: String,
    pub ty: Rc<FunctionType>,
    pub def: Rc<FuncDef>,
}

/// A host routine callable from scripts; dispatch bypasses the user-function
/// call protocols entirely.
pub struct NativeFunction {
    pub name: String,
    pub ty: Rc<FunctionType>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("ty", &self.ty.type_name())
            .finish_non_exhaustive()
    }
}

/// Anything a call expression can dispatch to.
#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<FunctionSymbol>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Function(f) => &f.name,
            Callable::Native(n) => &n.name,
        }
    }

    pub fn function_type(&self) -> &Rc<FunctionType> {
        match self {
            Callable::Function(f) => &f.ty,
            Callable::Native(n) => &n.ty,
        }
    }
}

/// What a name stands for.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    /// A plain value of the given type (objects, graphs, parameters).
    Value(TypeRef),
    /// A type name; aggregate types double as the scope of their members.
    Type(TypeRef),
    Callable(Callable),
    /// A host extension property bound into an aggregate's member scope.
    Property(TypeRef),
}

#[derive(Debug)]
pub struct Symbol {
    name: String,
    kind: SymbolKind,
}

impl Symbol {
    pub fn value(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), kind: SymbolKind::Value(ty) }
    }

    pub fn type_symbol(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), kind: SymbolKind::Type(ty) }
    }

    pub fn callable(callable: Callable) -> Self {
        Self { name: callable.name().to_string(), kind: SymbolKind::Callable(callable) }
    }

    pub fn property(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), kind: SymbolKind::Property(ty) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SymbolKind {
        &self.kind
    }

    /// The type this symbol carries, for every kind that has one.
    pub fn ty(&self) -> Option<TypeRef> {
        match &self.kind {
            SymbolKind::Value(ty) | SymbolKind::Type(ty) | SymbolKind::Property(ty) => {
                Some(ty.clone())
            },
            SymbolKind::Callable(_) => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match &self.kind {
            SymbolKind::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, SymbolKind::Type(_))
    }
}

/// One level of the lexical scope tree.
#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<ScopeRef>,
    ordered: RefCell<Vec<SymbolRef>>,
    index: RefCell<HashMap<String, usize>>,
}

impl Scope {
    /// A scope with no parent (the global scope, or an aggregate member
    /// scope).
    pub fn root() -> ScopeRef {
        Rc::new(Self::default())
    }

    pub fn child_of(parent: &ScopeRef) -> ScopeRef {
        Rc::new(Self { parent: Some(parent.clone()), ..Self::default() })
    }

    /// Bind a symbol in this scope.
    ///
    /// # Errors
    /// [`SemanticError::DuplicateSymbol`] if the name is already bound here.
    pub fn bind(&self, symbol: Symbol) -> Result<SymbolRef, SemanticError> {
        let name = symbol.name().to_string();
        let mut index = self.index.borrow_mut();
        if index.contains_key(&name) {
            return Err(SemanticError::DuplicateSymbol { name });
        }
        let symbol = Rc::new(symbol);
        let mut ordered = self.ordered.borrow_mut();
        index.insert(name, ordered.len());
        ordered.push(symbol.clone());
        Ok(symbol)
    }

    /// Resolve a name in this scope only.
    pub fn resolve_local(&self, name: &str) -> Option<SymbolRef> {
        let index = self.index.borrow();
        index.get(name).map(|&i| self.ordered.borrow()[i].clone())
    }

    /// Resolve a name here or in any enclosing scope.
    pub fn resolve(&self, name: &str) -> Option<SymbolRef> {
        if let Some(found) = self.resolve_local(name) {
            return Some(found);
        }
        self.parent.as_ref().and_then(|p| p.resolve(name))
    }

    /// Symbols in binding order.
    pub fn symbols(&self) -> Vec<SymbolRef> {
        self.ordered.borrow().clone()
    }

    /// Remove a binding again; used to roll back provisional type
    /// registrations so no partially built type stays published.
    pub(crate) fn unbind(&self, name: &str) {
        let mut index = self.index.borrow_mut();
        if let Some(position) = index.remove(name) {
            self.ordered.borrow_mut().remove(position);
            for slot in index.values_mut() {
                if *slot > position {
                    *slot -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::{BuiltIn, Type};

    fn int_symbol(name: &str) -> Symbol {
        Symbol::value(name, Type::builtin(BuiltIn::Int))
    }

    #[test]
    fn duplicate_bind_in_same_scope_fails() {
        let scope = Scope::root();
        scope.bind(int_symbol("x")).expect("first bind");
        assert_eq!(
            scope.bind(int_symbol("x")).unwrap_err(),
            SemanticError::DuplicateSymbol { name: "x".into() }
        );
    }

    #[test]
    fn shadowing_in_child_scope_is_allowed() {
        let outer = Scope::root();
        outer.bind(int_symbol("x")).expect("outer bind");
        let inner = Scope::child_of(&outer);
        let shadow = inner.bind(int_symbol("x")).expect("shadow bind");
        let resolved = inner.resolve("x").expect("resolves");
        assert!(Rc::ptr_eq(&resolved, &shadow));
    }

    #[test]
    fn resolve_walks_parents_and_local_does_not() {
        let outer = Scope::root();
        outer.bind(int_symbol("x")).expect("bind");
        let inner = Scope::child_of(&outer);
        assert!(inner.resolve("x").is_some());
        assert!(inner.resolve_local("x").is_none());
        assert!(inner.resolve("y").is_none());
    }

    #[test]
    fn unbind_keeps_lookup_consistent() {
        let scope = Scope::root();
        scope.bind(int_symbol("a")).expect("bind a");
        scope.bind(int_symbol("b")).expect("bind b");
        scope.unbind("a");
        assert!(scope.resolve("a").is_none());
        assert_eq!(scope.resolve("b").expect("b remains").name(), "b");
    }
}
