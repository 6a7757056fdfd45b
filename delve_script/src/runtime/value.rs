//! Script values and memory spaces --
//!
//! A `Value` is cheap to clone: aggregates and containers share their
//! contents, so two values obtained from the same host object alias the same
//! state. A `MemorySpace` is either a plain name table (global space,
//! function call spaces, plain aggregate values) or an encapsulation of a
//! live host object, where member reads and writes go straight through to
//! the host.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::warn;

use delve_model::TaskDependencyGraph;

use crate::environment::Environment;
use crate::host::HostRef;
use crate::runtime::RuntimeError;
use crate::semantic::scope::{Callable, SymbolKind};
use crate::semantic::types::{Type, TypeRef};

pub type MemorySpaceRef = Rc<MemorySpace>;

/// An aggregate value: its type plus the memory space holding its members.
#[derive(Debug, Clone)]
pub struct AggregateValue {
    pub ty: TypeRef,
    pub space: MemorySpaceRef,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Set(Rc<RefCell<Vec<Value>>>),
    Aggregate(AggregateValue),
    Func(Callable),
    Graph(TaskDependencyGraph),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn set(items: Vec<Value>) -> Self {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    /// Name used in diagnostics; aggregates report their type name.
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "none".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Bool(_) => "bool".into(),
            Value::Str(_) => "string".into(),
            Value::List(_) => "list".into(),
            Value::Set(_) => "set".into(),
            Value::Aggregate(av) => av.ty.name(),
            Value::Func(c) => c.function_type().type_name(),
            Value::Graph(_) => "graph".into(),
        }
    }

    /// Human-readable rendering, used by the `print` native.
    pub fn render(&self) -> String {
        match self {
            Value::None => "none".into(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Str(v) => v.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::render).collect();
                format!("[{}]", parts.join(", "))
            },
            Value::Set(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::render).collect();
                format!("{{{}}}", parts.join(", "))
            },
            Value::Aggregate(av) => format!("<{}>", av.ty.name()),
            Value::Func(c) => format!("<fn {}>", c.name()),
            Value::Graph(g) => format!("<graph with {} tasks>", g.node_count()),
        }
    }
}

enum Backing {
    Local(RefCell<HashMap<String, Value>>),
    /// Encapsulation of a live host object: reads translate the host member
    /// on demand, writes lower the script value and push it through.
    Host {
        object: HostRef,
        ty: TypeRef,
        env: Rc<Environment>,
    },
}

/// One level of the runtime name hierarchy.
pub struct MemorySpace {
    parent: Option<MemorySpaceRef>,
    backing: Backing,
}

impl fmt::Debug for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backing {
            Backing::Local(values) => f
                .debug_struct("MemorySpace")
                .field("names", &values.borrow().len())
                .finish_non_exhaustive(),
            Backing::Host { ty, .. } => f
                .debug_struct("MemorySpace")
                .field("encapsulates", &ty.name())
                .finish_non_exhaustive(),
        }
    }
}

impl MemorySpace {
    /// A root local space (the interpreter's global space).
    pub fn new() -> MemorySpaceRef {
        Rc::new(Self {
            parent: None,
            backing: Backing::Local(RefCell::new(HashMap::new())),
        })
    }

    pub fn child_of(parent: &MemorySpaceRef) -> MemorySpaceRef {
        Rc::new(Self {
            parent: Some(parent.clone()),
            backing: Backing::Local(RefCell::new(HashMap::new())),
        })
    }

    /// Wrap a live host object; member access goes through it.
    pub fn encapsulate(object: HostRef, ty: TypeRef, env: Rc<Environment>) -> MemorySpaceRef {
        Rc::new(Self { parent: None, backing: Backing::Host { object, ty, env } })
    }

    /// The live host object behind this space, when it encapsulates one.
    pub fn host_object(&self) -> Option<HostRef> {
        match &self.backing {
            Backing::Host { object, .. } => Some(object.clone()),
            Backing::Local(_) => None,
        }
    }

    /// Bind a name in this space, overwriting any previous binding here.
    pub fn bind(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match &self.backing {
            Backing::Local(values) => {
                values.borrow_mut().insert(name, value);
            },
            Backing::Host { .. } => {
                if let Err(err) = self.write_host_member(&name, value) {
                    warn!("dropped write to host member '{name}': {err}");
                }
            },
        }
    }

    /// Resolve a name in this space only.
    pub fn resolve_local(&self, name: &str) -> Option<Value> {
        match &self.backing {
            Backing::Local(values) => values.borrow().get(name).cloned(),
            Backing::Host { object, ty, env } => {
                let member = ty.as_aggregate()?.member(name)?;
                let host_value = match member.kind() {
                    SymbolKind::Property(prop_ty) => {
                        let Type::Property(pt) = &**prop_ty else { return None };
                        pt.property.get.as_ref().and_then(|get| get(object))?
                    },
                    _ => object.get_member(name)?,
                };
                match env.translate_runtime_object(&host_value) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!("cannot translate host member '{name}': {err}");
                        None
                    },
                }
            },
        }
    }

    /// Resolve a name here or in any enclosing space.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(found) = self.resolve_local(name) {
            return Some(found);
        }
        self.parent.as_ref().and_then(|p| p.resolve(name))
    }

    /// Assign to the innermost space already holding `name`. Returns
    /// `Ok(false)` when no space in the chain holds it.
    ///
    /// # Errors
    /// Host-backed writes can fail on lowering or member rejection.
    pub fn set(&self, name: &str, value: Value) -> Result<bool, RuntimeError> {
        match &self.backing {
            Backing::Local(values) => {
                let mut values = values.borrow_mut();
                if values.contains_key(name) {
                    values.insert(name.to_string(), value);
                    return Ok(true);
                }
            },
            Backing::Host { ty, .. } => {
                if ty.as_aggregate().and_then(|agg| agg.member(name)).is_some() {
                    self.write_host_member(name, value)?;
                    return Ok(true);
                }
            },
        }
        match &self.parent {
            Some(parent) => parent.set(name, value),
            None => Ok(false),
        }
    }

    /// Assign to an existing binding, or bind in this space if none exists.
    pub fn set_or_bind(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if !self.set(name, value.clone())? {
            self.bind(name, value);
        }
        Ok(())
    }

    fn write_host_member(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let Backing::Host { object, ty, env } = &self.backing else {
            return Ok(());
        };
        let member = ty.as_aggregate().and_then(|agg| agg.member(name)).ok_or_else(|| {
            RuntimeError::NoSuchMember { type_name: ty.name(), member: name.to_string() }
        })?;
        let member_ty = member.ty().ok_or_else(|| RuntimeError::NoSuchMember {
            type_name: ty.name(),
            member: name.to_string(),
        })?;
        let value = env.coerce(&member_ty, value, &format!("member '{name}'"))?;
        let lowered = env.lower(&value)?;
        if let SymbolKind::Property(prop_ty) = member.kind() {
            if let Type::Property(pt) = &**prop_ty {
                if let Some(set) = &pt.property.set {
                    set(object, lowered)?;
                    return Ok(());
                }
            }
            return Err(RuntimeError::NoSuchMember {
                type_name: ty.name(),
                member: name.to_string(),
            });
        }
        object.set_member(name, lowered)?;
        Ok(())
    }
}
