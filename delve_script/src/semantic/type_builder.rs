//! Type builder --
//!
//! Turns registered [`HostTypeDescriptor`]s into DSL-visible types. Member
//! shapes resolve recursively: named types against the target scope,
//! containers into interned list/set types, and callback shapes through a
//! pluggable registry of function type builders. If any member fails to
//! resolve, the whole host type is rejected and the provisional binding is
//! rolled back, so no partially built type is ever published.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::host::{CallbackShape, HostAdapter, HostMemberDef, HostProperty, HostTypeDescriptor, HostTypeExpr};
use crate::semantic::scope::{ScopeRef, Symbol};
use crate::semantic::types::{AggregateType, BuiltIn, FunctionType, PropertyType, Type, TypeError, TypeRef};

/// Builds one [`FunctionType`] flavor from a callback shape's type
/// arguments.
pub trait FunctionTypeBuilder {
    /// # Errors
    /// [`TypeError::CallbackArity`] when the argument count does not fit the
    /// shape.
    fn build(&self, shape: CallbackShape, args: &[TypeRef]) -> Result<FunctionType, TypeError>;
}

/// Consumer shapes: every type argument is a parameter, nothing is returned.
struct ConsumerTypeBuilder;

impl FunctionTypeBuilder for ConsumerTypeBuilder {
    fn build(&self, shape: CallbackShape, args: &[TypeRef]) -> Result<FunctionType, TypeError> {
        let expected = match shape {
            CallbackShape::Consumer => 1,
            CallbackShape::TriConsumer => 3,
            _ => return Err(TypeError::UnknownCallbackShape { shape }),
        };
        if args.len() != expected {
            return Err(TypeError::CallbackArity { shape, got: args.len() });
        }
        Ok(FunctionType { params: args.to_vec(), ret: Type::builtin(BuiltIn::None) })
    }
}

/// Returning shapes: the last type argument is the return type, the rest are
/// parameters.
struct ReturningTypeBuilder;

impl FunctionTypeBuilder for ReturningTypeBuilder {
    fn build(&self, shape: CallbackShape, args: &[TypeRef]) -> Result<FunctionType, TypeError> {
        let expected = match shape {
            CallbackShape::Function => 2,
            CallbackShape::BiFunction => 3,
            _ => return Err(TypeError::UnknownCallbackShape { shape }),
        };
        if args.len() != expected {
            return Err(TypeError::CallbackArity { shape, got: args.len() });
        }
        let (ret, params) = args.split_last().map(|(r, p)| (r.clone(), p.to_vec())).ok_or(
            TypeError::CallbackArity { shape, got: 0 },
        )?;
        Ok(FunctionType { params, ret })
    }
}

/// Descriptor-to-type translation with interned container and function
/// types.
pub struct TypeBuilder {
    shape_builders: HashMap<CallbackShape, Rc<dyn FunctionTypeBuilder>>,
    interned: RefCell<HashMap<String, TypeRef>>,
}

impl TypeBuilder {
    pub fn new() -> Self {
        let consumers: Rc<dyn FunctionTypeBuilder> = Rc::new(ConsumerTypeBuilder);
        let returning: Rc<dyn FunctionTypeBuilder> = Rc::new(ReturningTypeBuilder);
        let mut shape_builders: HashMap<CallbackShape, Rc<dyn FunctionTypeBuilder>> = HashMap::new();
        shape_builders.insert(CallbackShape::Consumer, consumers.clone());
        shape_builders.insert(CallbackShape::TriConsumer, consumers);
        shape_builders.insert(CallbackShape::Function, returning.clone());
        shape_builders.insert(CallbackShape::BiFunction, returning);
        Self { shape_builders, interned: RefCell::new(HashMap::new()) }
    }

    /// Replace or extend the builder for a callback shape.
    pub fn register_shape(&mut self, shape: CallbackShape, builder: Rc<dyn FunctionTypeBuilder>) {
        self.shape_builders.insert(shape, builder);
    }

    /// Build and bind the DSL type for a host descriptor in `scope`.
    ///
    /// The type symbol is bound provisionally first so members may refer to
    /// the type itself; any failure unbinds it again.
    ///
    /// # Errors
    /// [`TypeError::UnresolvedType`] (or a shape error) if any member type
    /// fails to resolve; the whole type is rejected.
    pub fn build_host_type(
        &self,
        desc: &HostTypeDescriptor,
        scope: &ScopeRef,
    ) -> Result<TypeRef, TypeError> {
        let ty: TypeRef = Rc::new(Type::Aggregate(AggregateType::new(
            desc.type_name.clone(),
            Some(desc.type_name.clone()),
        )));
        scope.bind(Symbol::type_symbol(desc.type_name.clone(), ty.clone()))?;

        match self.bind_members(desc, &ty, scope) {
            Ok(()) => {
                debug!("registered host type '{}'", desc.type_name);
                Ok(ty)
            },
            Err(err) => {
                scope.unbind(&desc.type_name);
                Err(err)
            },
        }
    }

    fn bind_members(
        &self,
        desc: &HostTypeDescriptor,
        ty: &TypeRef,
        scope: &ScopeRef,
    ) -> Result<(), TypeError> {
        let members: &[HostMemberDef] = match &desc.adapter {
            Some(HostAdapter::Pod { param, .. }) => std::slice::from_ref(param),
            Some(HostAdapter::Aggregate { params, .. }) => params,
            None => &desc.members,
        };

        let mut resolved = Vec::with_capacity(members.len());
        for member in members {
            let context = format!("member '{}' of '{}'", member.name, desc.type_name);
            resolved.push((member.name.clone(), self.resolve_expr(&member.ty, scope, &context)?));
        }

        let Some(aggregate) = ty.as_aggregate() else {
            return Err(TypeError::NotAggregate { type_name: desc.type_name.clone() });
        };
        for (name, member_ty) in resolved {
            aggregate.bind_member(Symbol::value(name, member_ty))?;
        }
        Ok(())
    }

    /// Resolve a declared member shape into a type.
    pub fn resolve_expr(
        &self,
        expr: &HostTypeExpr,
        scope: &ScopeRef,
        context: &str,
    ) -> Result<TypeRef, TypeError> {
        match expr {
            HostTypeExpr::Named(name) => scope
                .resolve(name)
                .filter(|sym| sym.is_type())
                .and_then(|sym| sym.ty())
                .ok_or_else(|| TypeError::UnresolvedType {
                    type_name: name.clone(),
                    context: context.to_string(),
                }),
            HostTypeExpr::List(elem) => {
                let elem = self.resolve_expr(elem, scope, context)?;
                Ok(self.intern(Type::List(elem)))
            },
            HostTypeExpr::Set(elem) => {
                let elem = self.resolve_expr(elem, scope, context)?;
                Ok(self.intern(Type::Set(elem)))
            },
            HostTypeExpr::Callback { shape, args } => {
                let builder = self
                    .shape_builders
                    .get(shape)
                    .ok_or(TypeError::UnknownCallbackShape { shape: *shape })?;
                let args = args
                    .iter()
                    .map(|a| self.resolve_expr(a, scope, context))
                    .collect::<Result<Vec<_>, _>>()?;
                let ft = builder.build(*shape, &args)?;
                Ok(self.intern(Type::Function(Rc::new(ft))))
            },
        }
    }

    /// Graft an extension property onto an already registered aggregate.
    ///
    /// # Errors
    /// [`TypeError`] if the extended type or the value type is unknown.
    pub fn register_property(
        &self,
        property: HostProperty,
        scope: &ScopeRef,
    ) -> Result<(), TypeError> {
        let target = self.resolve_expr(
            &HostTypeExpr::named(property.on_type.clone()),
            scope,
            &format!("property '{}'", property.name),
        )?;
        let Some(aggregate) = target.as_aggregate() else {
            return Err(TypeError::NotAggregate { type_name: property.on_type.clone() });
        };
        let value_ty = self.resolve_expr(
            &property.value_ty,
            scope,
            &format!("property '{}' on '{}'", property.name, property.on_type),
        )?;
        let name = property.name.clone();
        let prop_ty = Rc::new(Type::Property(PropertyType {
            value_ty,
            property: Rc::new(property),
        }));
        aggregate.bind_member(Symbol::property(name, prop_ty))?;
        Ok(())
    }

    fn intern(&self, ty: Type) -> TypeRef {
        let name = ty.name();
        let mut interned = self.interned.borrow_mut();
        if let Some(existing) = interned.get(&name) {
            return existing.clone();
        }
        let ty = Rc::new(ty);
        interned.insert(name, ty.clone());
        ty
    }
}

impl Default for TypeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
