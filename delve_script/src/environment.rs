//! Environment --
//!
//! Owns the global scope, the type builder, and the host type descriptor
//! registry, and carries the host-value/script-value translation both
//! directions. Everything a script can see is registered here explicitly at
//! bootstrap; [`default_environment`] installs the quest vocabulary.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::info;

use delve_model::TaskState;

use crate::entrypoint::ConfigBinding;
use crate::host::{
    CallbackShape, HostAccessError, HostAdapter, HostMemberDef, HostProperty, HostRef,
    HostTypeDescriptor, HostTypeExpr, HostValue, TaskBinding,
};
use crate::runtime::RuntimeError;
use crate::runtime::value::{AggregateValue, MemorySpace, Value};
use crate::semantic::SemanticError;
use crate::semantic::scope::{Callable, NativeFn, NativeFunction, Scope, ScopeRef, Symbol};
use crate::semantic::type_builder::TypeBuilder;
use crate::semantic::types::{AggregateType, BuiltIn, FunctionType, Type, TypeError, TypeRef};

/// The registered world a script program runs against.
pub struct Environment {
    global_scope: ScopeRef,
    type_builder: TypeBuilder,
    descriptors: RefCell<HashMap<String, Rc<HostTypeDescriptor>>>,
}

impl Environment {
    /// An environment with only the built-in types bound.
    pub fn new() -> Self {
        let global_scope = Scope::root();
        for builtin in [BuiltIn::Int, BuiltIn::Float, BuiltIn::Bool, BuiltIn::Str, BuiltIn::Graph] {
            // binding fresh names into a fresh scope cannot collide
            let _ = global_scope.bind(Symbol::type_symbol(builtin.name(), Type::builtin(builtin)));
        }
        Self {
            global_scope,
            type_builder: TypeBuilder::new(),
            descriptors: RefCell::new(HashMap::new()),
        }
    }

    pub fn global_scope(&self) -> &ScopeRef {
        &self.global_scope
    }

    pub fn type_builder(&self) -> &TypeBuilder {
        &self.type_builder
    }

    /// Make a host type DSL-visible.
    ///
    /// # Errors
    /// [`TypeError`] if any member shape fails to resolve; the whole type is
    /// rejected.
    pub fn register_host_type(&self, desc: HostTypeDescriptor) -> Result<TypeRef, TypeError> {
        let desc = Rc::new(desc);
        let ty = self.type_builder.build_host_type(&desc, &self.global_scope)?;
        self.descriptors.borrow_mut().insert(desc.type_name.clone(), desc);
        Ok(ty)
    }

    /// Graft an extension property onto a registered host type.
    ///
    /// # Errors
    /// [`TypeError`] if the extended type or value type is unknown.
    pub fn register_property(&self, property: HostProperty) -> Result<(), TypeError> {
        self.type_builder.register_property(property, &self.global_scope)
    }

    /// Bind a native function in the global scope.
    ///
    /// # Errors
    /// [`SemanticError::DuplicateSymbol`] on a name collision.
    pub fn register_native(
        &self,
        name: impl Into<String>,
        params: Vec<TypeRef>,
        ret: TypeRef,
        func: NativeFn,
    ) -> Result<(), SemanticError> {
        let native = NativeFunction {
            name: name.into(),
            ty: Rc::new(FunctionType { params, ret }),
            func,
        };
        self.global_scope.bind(Symbol::callable(Callable::Native(Rc::new(native))))?;
        Ok(())
    }

    pub fn descriptor(&self, type_name: &str) -> Option<Rc<HostTypeDescriptor>> {
        self.descriptors.borrow().get(type_name).cloned()
    }

    /// Resolve a type by DSL name in the global scope.
    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.global_scope.resolve(name).filter(|s| s.is_type()).and_then(|s| s.ty())
    }

    /// Bring a host value into the script world.
    ///
    /// A host object of a registered type becomes an aggregate value whose
    /// memory space encapsulates the live object, so translating the same
    /// host identity twice yields values aliasing the same state.
    ///
    /// # Errors
    /// [`RuntimeError::Untranslatable`] for objects of unregistered types.
    pub fn translate_runtime_object(self: &Rc<Self>, host: &HostValue) -> Result<Value, RuntimeError> {
        match host {
            HostValue::None => Ok(Value::None),
            HostValue::Int(v) => Ok(Value::Int(*v)),
            HostValue::Float(v) => Ok(Value::Float(*v)),
            HostValue::Bool(v) => Ok(Value::Bool(*v)),
            HostValue::Str(v) => Ok(Value::Str(v.clone())),
            HostValue::List(items) => Ok(Value::list(
                items.iter().map(|i| self.translate_runtime_object(i)).collect::<Result<_, _>>()?,
            )),
            HostValue::Set(items) => Ok(Value::set(
                items.iter().map(|i| self.translate_runtime_object(i)).collect::<Result<_, _>>()?,
            )),
            HostValue::Graph(g) => Ok(Value::Graph(g.clone())),
            HostValue::Object(object) => {
                let ty = self
                    .lookup_type(object.type_key())
                    .ok_or_else(|| RuntimeError::Untranslatable(object.type_key().to_string()))?;
                Ok(Value::Aggregate(AggregateValue {
                    ty: ty.clone(),
                    space: MemorySpace::encapsulate(object.clone(), ty, self.clone()),
                }))
            },
            HostValue::Callback(_) => Err(RuntimeError::Untranslatable("callback".into())),
        }
    }

    /// Lower a script value to its host mirror, for values that need no
    /// construction: primitives, containers of such, graphs, and aggregates
    /// already backed by a host object. Function values need adaptation and
    /// are handled by the interpreter.
    ///
    /// # Errors
    /// [`RuntimeError::NotInstantiable`] for values only the interpreter can
    /// instantiate.
    pub fn lower(&self, value: &Value) -> Result<HostValue, RuntimeError> {
        match value {
            Value::None => Ok(HostValue::None),
            Value::Int(v) => Ok(HostValue::Int(*v)),
            Value::Float(v) => Ok(HostValue::Float(*v)),
            Value::Bool(v) => Ok(HostValue::Bool(*v)),
            Value::Str(v) => Ok(HostValue::Str(v.clone())),
            Value::List(items) => Ok(HostValue::List(
                items.borrow().iter().map(|i| self.lower(i)).collect::<Result<_, _>>()?,
            )),
            Value::Set(items) => Ok(HostValue::Set(
                items.borrow().iter().map(|i| self.lower(i)).collect::<Result<_, _>>()?,
            )),
            Value::Graph(g) => Ok(HostValue::Graph(g.clone())),
            Value::Aggregate(av) => av
                .space
                .host_object()
                .map(HostValue::Object)
                .ok_or_else(|| RuntimeError::NotInstantiable(av.ty.name())),
            Value::Func(c) => Err(RuntimeError::NotInstantiable(format!("fn {}", c.name()))),
        }
    }

    /// Check a value against a declared type, promoting where the type
    /// system allows it (int literals into float slots, plain values into
    /// pod-adapted slots).
    ///
    /// # Errors
    /// [`RuntimeError::TypeMismatch`] when the value does not fit.
    pub fn coerce(&self, expected: &TypeRef, value: Value, context: &str) -> Result<Value, RuntimeError> {
        let mismatch = |found: &Value| RuntimeError::TypeMismatch {
            expected: expected.name(),
            found: found.type_name(),
            context: context.to_string(),
        };
        match &**expected {
            Type::Property(pt) => self.coerce(&pt.value_ty, value, context),
            Type::BuiltIn(BuiltIn::None) => match value {
                Value::None => Ok(value),
                other => Err(mismatch(&other)),
            },
            Type::BuiltIn(BuiltIn::Int) => match value {
                Value::Int(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            Type::BuiltIn(BuiltIn::Float) => match value {
                Value::Float(_) => Ok(value),
                #[allow(clippy::cast_precision_loss)]
                Value::Int(v) => Ok(Value::Float(v as f64)),
                other => Err(mismatch(&other)),
            },
            Type::BuiltIn(BuiltIn::Bool) => match value {
                Value::Bool(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            Type::BuiltIn(BuiltIn::Str) => match value {
                Value::Str(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            Type::BuiltIn(BuiltIn::Graph) => match value {
                Value::Graph(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            Type::List(elem) => match value {
                Value::List(items) => {
                    let coerced = items
                        .borrow()
                        .iter()
                        .map(|i| self.coerce(elem, i.clone(), context))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::list(coerced))
                },
                other => Err(mismatch(&other)),
            },
            Type::Set(elem) => match value {
                Value::Set(items) => {
                    let coerced = items
                        .borrow()
                        .iter()
                        .map(|i| self.coerce(elem, i.clone(), context))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::set(coerced))
                },
                other => Err(mismatch(&other)),
            },
            Type::Aggregate(agg) => {
                if let Value::Aggregate(av) = &value {
                    if av.ty.name() == agg.name() {
                        return Ok(value);
                    }
                }
                if self.pod_accepts(agg, &value) {
                    return Ok(value);
                }
                Err(mismatch(&value))
            },
            Type::Function(ft) => match value {
                Value::Func(ref c) if c.function_type().type_name() == ft.type_name() => Ok(value),
                other => Err(mismatch(&other)),
            },
        }
    }

    /// Whether a plain value can pass into a slot of a pod-adapted type;
    /// the actual conversion runs at instantiation.
    fn pod_accepts(&self, aggregate: &AggregateType, value: &Value) -> bool {
        let Some(desc) = aggregate.host_key().and_then(|key| self.descriptor(key)) else {
            return false;
        };
        let Some(HostAdapter::Pod { param, .. }) = &desc.adapter else {
            return false;
        };
        let HostTypeExpr::Named(param_type) = &param.ty else {
            return false;
        };
        let value_type = value.type_name();
        value_type == *param_type || (param_type == "float" && value_type == "int")
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// The quest vocabulary: the `task` and `quest_config` host types, the
/// `state` extension property, and the `print` native.
///
/// # Errors
/// [`TypeError`] if registration fails; with a fresh environment it cannot.
pub fn default_environment() -> Result<Rc<Environment>, TypeError> {
    let env = Environment::new();

    env.register_host_type(HostTypeDescriptor {
        type_name: TaskBinding::TYPE_NAME.into(),
        members: vec![
            HostMemberDef::new("name", HostTypeExpr::named("string")),
            HostMemberDef::new("points", HostTypeExpr::named("float")),
            HostMemberDef::new("points_to_solve", HostTypeExpr::named("float")),
            HostMemberDef::new(
                "on_activate",
                HostTypeExpr::Callback {
                    shape: CallbackShape::Consumer,
                    args: vec![HostTypeExpr::named("task")],
                },
            ),
            HostMemberDef::new(
                "scoring_function",
                HostTypeExpr::Callback {
                    shape: CallbackShape::BiFunction,
                    args: vec![
                        HostTypeExpr::named("task"),
                        HostTypeExpr::Set(Box::new(HostTypeExpr::named("string"))),
                        HostTypeExpr::named("float"),
                    ],
                },
            ),
        ],
        factory: Some(Rc::new(|| Rc::new(TaskBinding::new()) as HostRef)),
        adapter: None,
    })?;

    env.register_property(HostProperty {
        name: "state".into(),
        on_type: TaskBinding::TYPE_NAME.into(),
        value_ty: HostTypeExpr::named("string"),
        get: Some(Rc::new(|host: &HostRef| {
            host.as_any()
                .downcast_ref::<TaskBinding>()
                .map(|binding| HostValue::Str(binding.state().to_string()))
        })),
        set: Some(Rc::new(|host: &HostRef, value: HostValue| {
            let wrong = || HostAccessError::WrongShape { member: "state".into() };
            let HostValue::Str(text) = value else { return Err(wrong()) };
            let state: TaskState = text.parse().map_err(|_| wrong())?;
            let binding = host.as_any().downcast_ref::<TaskBinding>().ok_or_else(wrong)?;
            binding.task.borrow_mut().set_state(state);
            Ok(())
        })),
    })?;

    env.register_host_type(HostTypeDescriptor {
        type_name: ConfigBinding::TYPE_NAME.into(),
        members: vec![
            HostMemberDef::new("name", HostTypeExpr::named("string")),
            HostMemberDef::new("dependency_graph", HostTypeExpr::named("graph")),
            HostMemberDef::new("level_graph", HostTypeExpr::named("graph")),
            HostMemberDef::new("quest_desc", HostTypeExpr::named("string")),
            HostMemberDef::new("quest_points", HostTypeExpr::named("int")),
        ],
        factory: Some(Rc::new(|| Rc::new(ConfigBinding::default()) as HostRef)),
        adapter: None,
    })?;

    let string_ty = env.lookup_type("string").ok_or_else(|| TypeError::UnresolvedType {
        type_name: "string".into(),
        context: "native 'print'".into(),
    })?;
    env.register_native(
        "print",
        vec![string_ty],
        Type::builtin(BuiltIn::None),
        Rc::new(|_, args| {
            if let Some(value) = args.first() {
                info!("{}", value.render());
            }
            Ok(Value::None)
        }),
    )?;

    Ok(Rc::new(env))
}
