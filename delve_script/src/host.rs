//! Host interop --
//!
//! Host types become DSL-visible through explicit registration: a
//! [`HostTypeDescriptor`] declares the members (and their shapes) the type
//! exposes, and a [`HostInstance`] implementation carries live member access.
//! No runtime introspection happens anywhere; whatever is not declared here
//! does not exist for scripts.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use delve_model::{Task, TaskDependencyGraph, TaskHandle, TaskState};

use crate::runtime::callback::CallbackHandle;

/// Shared handle to a live host object.
pub type HostRef = Rc<dyn HostInstance>;

/// Errors from member access on a live host object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostAccessError {
    #[error("host type '{type_key}' has no member '{member}'")]
    UnknownMember { type_key: String, member: String },
    #[error("member '{member}' rejected a value of the wrong shape")]
    WrongShape { member: String },
}

/// Live member access on a host object. Implementations use interior
/// mutability so every clone of the handle aliases the same state.
pub trait HostInstance: Any {
    /// The DSL type name this instance belongs to.
    fn type_key(&self) -> &str;

    fn get_member(&self, name: &str) -> Option<HostValue>;

    /// Write a member through to the live object.
    ///
    /// # Errors
    /// [`HostAccessError`] on an undeclared member or an incompatible value.
    fn set_member(&self, name: &str, value: HostValue) -> Result<(), HostAccessError>;

    /// Concrete-type escape hatch for bindings the runtime knows (tasks,
    /// configs).
    fn as_any(&self) -> &dyn Any;
}

/// The host-side mirror of [`crate::runtime::value::Value`].
#[derive(Clone)]
pub enum HostValue {
    None,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<HostValue>),
    Set(Vec<HostValue>),
    Object(HostRef),
    Graph(TaskDependencyGraph),
    Callback(CallbackHandle),
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => write!(f, "None"),
            HostValue::Int(v) => write!(f, "Int({v})"),
            HostValue::Float(v) => write!(f, "Float({v})"),
            HostValue::Bool(v) => write!(f, "Bool({v})"),
            HostValue::Str(v) => write!(f, "Str({v:?})"),
            HostValue::List(v) => f.debug_tuple("List").field(v).finish(),
            HostValue::Set(v) => f.debug_tuple("Set").field(v).finish(),
            HostValue::Object(o) => write!(f, "Object({})", o.type_key()),
            HostValue::Graph(g) => write!(f, "Graph({} nodes)", g.node_count()),
            HostValue::Callback(c) => write!(f, "Callback(arity {})", c.arity()),
        }
    }
}

/// Functional shapes a callback-typed member may declare. Each shape has a
/// registered function type builder (see
/// [`crate::semantic::type_builder::TypeBuilder`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackShape {
    /// `fn(a) -> none`
    Consumer,
    /// `fn(a, b, c) -> none`
    TriConsumer,
    /// `fn(a) -> r`; the last type argument is the return type.
    Function,
    /// `fn(a, b) -> r`
    BiFunction,
}

/// Declared shape of a host member's type.
#[derive(Debug, Clone)]
pub enum HostTypeExpr {
    /// A built-in or registered type by DSL name.
    Named(String),
    List(Box<HostTypeExpr>),
    Set(Box<HostTypeExpr>),
    Callback { shape: CallbackShape, args: Vec<HostTypeExpr> },
}

impl HostTypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        HostTypeExpr::Named(name.into())
    }
}

/// One declared member of a host type.
#[derive(Debug, Clone)]
pub struct HostMemberDef {
    pub name: String,
    pub ty: HostTypeExpr,
}

impl HostMemberDef {
    pub fn new(name: impl Into<String>, ty: HostTypeExpr) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Creates a fresh default instance of a host type.
pub type HostFactory = Rc<dyn Fn() -> HostRef>;
/// Builds a pod-adapted host value from its single parameter.
pub type PodBuildFn = Rc<dyn Fn(HostValue) -> Result<HostValue, HostAccessError>>;
/// Builds an adapter-constructed host value from its parameters, in
/// declaration order.
pub type AggregateBuildFn = Rc<dyn Fn(Vec<HostValue>) -> Result<HostValue, HostAccessError>>;

/// A builder routine standing in for direct construction of a host type.
#[derive(Clone)]
pub enum HostAdapter {
    /// Single-parameter adapter; the DSL type gets that one parameter as its
    /// only member, and plain values of the parameter type convert through
    /// the adapter on assignment.
    Pod { param: HostMemberDef, build: PodBuildFn },
    /// Multi-parameter adapter; the DSL type's members are the parameters in
    /// declaration order.
    Aggregate { params: Vec<HostMemberDef>, build: AggregateBuildFn },
}

impl fmt::Debug for HostAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAdapter::Pod { param, .. } => f.debug_struct("Pod").field("param", param).finish_non_exhaustive(),
            HostAdapter::Aggregate { params, .. } => {
                f.debug_struct("Aggregate").field("params", params).finish_non_exhaustive()
            },
        }
    }
}

/// Everything the type builder needs to make a host type DSL-visible.
#[derive(Clone)]
pub struct HostTypeDescriptor {
    /// DSL type name, also the descriptor registry key.
    pub type_name: String,
    pub members: Vec<HostMemberDef>,
    /// Default-instance factory for descriptor-backed construction.
    pub factory: Option<HostFactory>,
    pub adapter: Option<HostAdapter>,
}

impl fmt::Debug for HostTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTypeDescriptor")
            .field("type_name", &self.type_name)
            .field("members", &self.members)
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

/// Getter closure of an extension property.
pub type PropertyGetFn = Rc<dyn Fn(&HostRef) -> Option<HostValue>>;
/// Setter closure of an extension property.
pub type PropertySetFn = Rc<dyn Fn(&HostRef, HostValue) -> Result<(), HostAccessError>>;

/// An extension property grafted onto a registered host type.
pub struct HostProperty {
    pub name: String,
    pub on_type: String,
    pub value_ty: HostTypeExpr,
    pub get: Option<PropertyGetFn>,
    pub set: Option<PropertySetFn>,
}

impl fmt::Debug for HostProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProperty")
            .field("name", &self.name)
            .field("on_type", &self.on_type)
            .field("value_ty", &self.value_ty)
            .field("gettable", &self.get.is_some())
            .field("settable", &self.set.is_some())
            .finish()
    }
}

/// The scripted view of a [`Task`]: the shared task handle plus the callback
/// members authors may attach. Cloning the binding aliases the same task.
#[derive(Debug, Clone)]
pub struct TaskBinding {
    pub task: TaskHandle,
    callbacks: Rc<RefCell<HashMap<String, CallbackHandle>>>,
}

impl TaskBinding {
    pub const TYPE_NAME: &'static str = "task";

    pub fn new() -> Self {
        Self::from_handle(Task::new("").into_handle())
    }

    pub fn from_handle(task: TaskHandle) -> Self {
        Self { task, callbacks: Rc::new(RefCell::new(HashMap::new())) }
    }

    pub fn callback(&self, name: &str) -> Option<CallbackHandle> {
        self.callbacks.borrow().get(name).cloned()
    }

    pub fn state(&self) -> TaskState {
        self.task.borrow().state()
    }
}

impl Default for TaskBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInstance for TaskBinding {
    fn type_key(&self) -> &str {
        Self::TYPE_NAME
    }

    fn get_member(&self, name: &str) -> Option<HostValue> {
        match name {
            "name" => Some(HostValue::Str(self.task.borrow().name.clone())),
            "points" => Some(HostValue::Float(f64::from(self.task.borrow().points))),
            "points_to_solve" => {
                Some(HostValue::Float(f64::from(self.task.borrow().points_to_solve)))
            },
            "on_activate" | "scoring_function" => Some(
                self.callback(name).map_or(HostValue::None, HostValue::Callback),
            ),
            _ => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_member(&self, name: &str, value: HostValue) -> Result<(), HostAccessError> {
        let wrong_shape = || HostAccessError::WrongShape { member: name.to_string() };
        match name {
            "name" => match value {
                HostValue::Str(s) => {
                    self.task.borrow_mut().name = s;
                    Ok(())
                },
                _ => Err(wrong_shape()),
            },
            "points" | "points_to_solve" => {
                let number = match value {
                    HostValue::Float(v) => v as f32,
                    #[allow(clippy::cast_precision_loss)]
                    HostValue::Int(v) => v as f32,
                    _ => return Err(wrong_shape()),
                };
                let mut task = self.task.borrow_mut();
                if name == "points" {
                    task.points = number;
                } else {
                    task.points_to_solve = number;
                }
                Ok(())
            },
            "on_activate" | "scoring_function" => match value {
                HostValue::Callback(handle) => {
                    self.callbacks.borrow_mut().insert(name.to_string(), handle);
                    Ok(())
                },
                HostValue::None => Ok(()),
                _ => Err(wrong_shape()),
            },
            _ => Err(HostAccessError::UnknownMember {
                type_key: Self::TYPE_NAME.to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recover the shared task handle behind a host object, when it is a task.
pub fn task_handle(host: &HostRef) -> Option<TaskHandle> {
    host.as_any().downcast_ref::<TaskBinding>().map(|b| b.task.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_binding_reads_and_writes_through() {
        let binding = TaskBinding::new();
        binding
            .set_member("name", HostValue::Str("find the key".into()))
            .expect("set name");
        binding.set_member("points", HostValue::Int(3)).expect("set points");
        assert_eq!(binding.task.borrow().name, "find the key");
        assert!(matches!(
            binding.get_member("points"),
            Some(HostValue::Float(v)) if (v - 3.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn undeclared_members_are_rejected() {
        let binding = TaskBinding::new();
        assert!(binding.get_member("hitpoints").is_none());
        assert!(matches!(
            binding.set_member("hitpoints", HostValue::Int(1)),
            Err(HostAccessError::UnknownMember { .. })
        ));
    }

    #[test]
    fn clones_alias_the_same_task() {
        let binding = TaskBinding::new();
        let clone = binding.clone();
        clone.set_member("name", HostValue::Str("shared".into())).expect("set");
        assert_eq!(binding.task.borrow().name, "shared");
    }
}
