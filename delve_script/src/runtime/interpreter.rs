//! Tree-walking interpreter --
//!
//! Walks analyzed programs directly. The interpreter is cheap to clone: every
//! clone shares the environment, the global memory space, and the space
//! stack, so a callback adapter can carry one around and re-enter evaluation
//! from host code.

use std::cell::RefCell;
use std::rc::Rc;

use log::warn;

use delve_model::{EdgeKind, TaskDependencyGraph};

use crate::ast::{BinaryOp, GraphDef, Node, ObjectDef, UnaryOp};
use crate::environment::Environment;
use crate::host::{HostAdapter, HostValue, task_handle};
use crate::runtime::RuntimeError;
use crate::runtime::callback::build_adapter;
use crate::runtime::value::{AggregateValue, MemorySpace, MemorySpaceRef, Value};
use crate::semantic::scope::Callable;
use crate::semantic::types::{Type, TypeRef};

/// Statement outcome: either control flows on, or a `return` is unwinding.
enum Flow {
    Normal,
    Return(Value),
}

#[derive(Clone)]
pub struct Interpreter {
    env: Rc<Environment>,
    global: MemorySpaceRef,
    stack: Rc<RefCell<Vec<MemorySpaceRef>>>,
}

impl Interpreter {
    /// An interpreter over the given environment. The global memory space is
    /// created once here and lives as long as the interpreter does.
    pub fn new(env: Rc<Environment>) -> Self {
        Self { env, global: MemorySpace::new(), stack: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn environment(&self) -> &Rc<Environment> {
        &self.env
    }

    pub fn global_space(&self) -> &MemorySpaceRef {
        &self.global
    }

    /// The innermost active memory space.
    pub fn current_space(&self) -> MemorySpaceRef {
        self.stack.borrow().last().cloned().unwrap_or_else(|| self.global.clone())
    }

    pub(crate) fn push_space(&self, space: MemorySpaceRef) {
        self.stack.borrow_mut().push(space);
    }

    pub(crate) fn pop_space(&self) {
        self.stack.borrow_mut().pop();
    }

    /// Evaluate a node to a value in the current space.
    ///
    /// # Errors
    /// Any [`RuntimeError`] the evaluation raises.
    pub fn eval(&self, node: &Node) -> Result<Value, RuntimeError> {
        match node {
            Node::Program(nodes) => {
                for n in nodes {
                    self.eval(n)?;
                }
                Ok(Value::None)
            },
            Node::ObjectDef(def) => self.eval_object_def(def),
            Node::GraphDef(def) => self.eval_graph_def(def),
            // function definitions are bound ahead of evaluation
            Node::FuncDef(_) => Ok(Value::None),
            Node::VarDecl { .. }
            | Node::Assign { .. }
            | Node::Return(_)
            | Node::If { .. }
            | Node::ForIn { .. } => match self.exec_stmt(node)? {
                Flow::Normal => Ok(Value::None),
                Flow::Return(value) => Ok(value),
            },
            Node::Call { name, args, .. } => {
                let callable = self.resolve_callable(name)?;
                self.call_function(&callable, args)
            },
            Node::Member { receiver, name } => {
                let value = self.eval(receiver)?;
                let Value::Aggregate(av) = &value else {
                    return Err(RuntimeError::NoSuchMember {
                        type_name: value.type_name(),
                        member: name.clone(),
                    });
                };
                av.space.resolve_local(name).ok_or_else(|| RuntimeError::NoSuchMember {
                    type_name: av.ty.name(),
                    member: name.clone(),
                })
            },
            Node::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                eval_binary(*op, &lhs, &rhs)
            },
            Node::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match (op, &operand) {
                    (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(-v)),
                    (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
                    (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
                    _ => Err(RuntimeError::InvalidOperands {
                        op: match op {
                            UnaryOp::Neg => "-",
                            UnaryOp::Not => "!",
                        },
                        lhs: operand.type_name(),
                        rhs: "nothing".into(),
                    }),
                }
            },
            Node::ListLit(items) => Ok(Value::list(
                items.iter().map(|i| self.eval(i)).collect::<Result<_, _>>()?,
            )),
            Node::SetLit(items) => Ok(Value::set(
                items.iter().map(|i| self.eval(i)).collect::<Result<_, _>>()?,
            )),
            Node::Id { name, .. } => {
                if let Some(value) = self.current_space().resolve(name) {
                    return Ok(value);
                }
                // callables live in scopes, not memory spaces
                if let Ok(callable) = self.resolve_callable(name) {
                    return Ok(Value::Func(callable));
                }
                Err(RuntimeError::UnknownIdentifier { name: name.clone() })
            },
            Node::Int(v) => Ok(Value::Int(*v)),
            Node::Float(v) => Ok(Value::Float(*v)),
            Node::Bool(v) => Ok(Value::Bool(*v)),
            Node::Str(v) => Ok(Value::Str(v.clone())),
        }
    }

    fn exec_block(&self, body: &[Node]) -> Result<Flow, RuntimeError> {
        for node in body {
            if let Flow::Return(value) = self.exec_stmt(node)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, node: &Node) -> Result<Flow, RuntimeError> {
        match node {
            Node::VarDecl { name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                self.current_space().bind(name.clone(), value);
                Ok(Flow::Normal)
            },
            Node::Assign { target, value } => {
                let value = self.eval(value)?;
                match &**target {
                    Node::Id { name, .. } => {
                        self.current_space().set_or_bind(name, value)?;
                    },
                    Node::Member { receiver, name } => {
                        let receiver = self.eval(receiver)?;
                        let Value::Aggregate(av) = &receiver else {
                            return Err(RuntimeError::NoSuchMember {
                                type_name: receiver.type_name(),
                                member: name.clone(),
                            });
                        };
                        if !av.space.set(name, value)? {
                            return Err(RuntimeError::NoSuchMember {
                                type_name: av.ty.name(),
                                member: name.clone(),
                            });
                        }
                    },
                    other => {
                        return Err(RuntimeError::InvalidOperands {
                            op: "=",
                            lhs: format!("{other:?}"),
                            rhs: value.type_name(),
                        });
                    },
                }
                Ok(Flow::Normal)
            },
            Node::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            },
            Node::If { condition, then_body, else_body } => {
                let condition = self.eval(condition)?;
                let Value::Bool(condition) = condition else {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "bool".into(),
                        found: condition.type_name(),
                        context: "if condition".into(),
                    });
                };
                let body = if condition { then_body } else { else_body };
                let space = MemorySpace::child_of(&self.current_space());
                self.push_space(space);
                let flow = self.exec_block(body);
                self.pop_space();
                flow
            },
            Node::ForIn { var, iterable, body } => {
                let iterable = self.eval(iterable)?;
                let items: Vec<Value> = match &iterable {
                    Value::List(items) | Value::Set(items) => items.borrow().clone(),
                    other => return Err(RuntimeError::NotIterable(other.type_name())),
                };
                let space = MemorySpace::child_of(&self.current_space());
                self.push_space(space.clone());
                let mut flow = Flow::Normal;
                for item in items {
                    space.bind(var.clone(), item);
                    match self.exec_block(body) {
                        Ok(Flow::Normal) => {},
                        Ok(Flow::Return(value)) => {
                            flow = Flow::Return(value);
                            break;
                        },
                        Err(err) => {
                            self.pop_space();
                            return Err(err);
                        },
                    }
                }
                self.pop_space();
                Ok(flow)
            },
            expr => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            },
        }
    }

    /// Find a callable: function values bound in memory spaces first, then
    /// callables in the global scope.
    ///
    /// # Errors
    /// [`RuntimeError::UnknownCallable`] when nothing matches.
    pub fn resolve_callable(&self, name: &str) -> Result<Callable, RuntimeError> {
        if let Some(Value::Func(callable)) = self.current_space().resolve(name) {
            return Ok(callable);
        }
        self.env
            .global_scope()
            .resolve(name)
            .and_then(|symbol| symbol.as_callable().cloned())
            .ok_or_else(|| RuntimeError::UnknownCallable { name: name.to_string() })
    }

    /// First call protocol: argument expressions are evaluated in the
    /// caller's space, then the callable is invoked.
    ///
    /// # Errors
    /// Arity or type mismatches, or any error the body raises.
    pub fn call_function(&self, callable: &Callable, args: &[Node]) -> Result<Value, RuntimeError> {
        let values = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
        self.call_function_with_values(callable, values)
    }

    /// Second call protocol: arguments arrive as already-evaluated values
    /// (callback adapters and host code use this).
    ///
    /// # Errors
    /// Arity or type mismatches, or any error the body raises.
    pub fn call_function_with_values(
        &self,
        callable: &Callable,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let ty = callable.function_type();
        if args.len() != ty.params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: callable.name().to_string(),
                expected: ty.params.len(),
                got: args.len(),
            });
        }
        let context = format!("call to '{}'", callable.name());
        let args = args
            .into_iter()
            .zip(&ty.params)
            .map(|(arg, param)| self.env.coerce(param, arg, &context))
            .collect::<Result<Vec<_>, _>>()?;
        match callable {
            Callable::Native(native) => (native.func)(self, args),
            Callable::Function(function) => {
                let space = MemorySpace::child_of(&self.current_space());
                for (param, value) in function.def.params.iter().zip(args) {
                    space.bind(param.name.clone(), value);
                }
                self.push_space(space);
                let flow = self.exec_block(&function.def.body);
                self.pop_space();
                match flow? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::None),
                }
            },
        }
    }

    /// Turn a script value into a host value, constructing host objects and
    /// callback adapters where needed.
    ///
    /// # Errors
    /// [`RuntimeError::NotInstantiable`] when no construction path exists.
    pub fn instantiate(&self, value: &Value) -> Result<HostValue, RuntimeError> {
        match value {
            Value::Func(callable) => {
                let handle = build_adapter(self, callable, &self.current_space())?;
                Ok(HostValue::Callback(handle))
            },
            Value::List(items) => Ok(HostValue::List(
                items.borrow().iter().map(|i| self.instantiate(i)).collect::<Result<_, _>>()?,
            )),
            Value::Set(items) => Ok(HostValue::Set(
                items.borrow().iter().map(|i| self.instantiate(i)).collect::<Result<_, _>>()?,
            )),
            Value::Aggregate(av) => self.instantiate_aggregate(av),
            plain => self.env.lower(plain),
        }
    }

    /// Like [`Self::instantiate`], but converts plain values into
    /// pod-adapted host values when the declared type calls for it.
    ///
    /// # Errors
    /// Same as [`Self::instantiate`].
    pub fn instantiate_as(&self, value: &Value, expected: &TypeRef) -> Result<HostValue, RuntimeError> {
        match (&**expected, value) {
            (Type::List(elem), Value::List(items)) => Ok(HostValue::List(
                items
                    .borrow()
                    .iter()
                    .map(|i| self.instantiate_as(i, elem))
                    .collect::<Result<_, _>>()?,
            )),
            (Type::Set(elem), Value::Set(items)) => Ok(HostValue::Set(
                items
                    .borrow()
                    .iter()
                    .map(|i| self.instantiate_as(i, elem))
                    .collect::<Result<_, _>>()?,
            )),
            (Type::Aggregate(agg), plain) if !matches!(plain, Value::Aggregate(_)) => {
                let desc = agg
                    .host_key()
                    .and_then(|key| self.env.descriptor(key))
                    .ok_or_else(|| RuntimeError::NotInstantiable(agg.name().to_string()))?;
                let Some(HostAdapter::Pod { build, .. }) = &desc.adapter else {
                    return Err(RuntimeError::NotInstantiable(agg.name().to_string()));
                };
                let lowered = self.env.lower(plain)?;
                Ok(build(lowered)?)
            },
            (Type::Property(pt), _) => self.instantiate_as(value, &pt.value_ty),
            _ => self.instantiate(value),
        }
    }

    fn instantiate_aggregate(&self, av: &AggregateValue) -> Result<HostValue, RuntimeError> {
        if let Some(object) = av.space.host_object() {
            return Ok(HostValue::Object(object));
        }
        let agg = av
            .ty
            .as_aggregate()
            .ok_or_else(|| RuntimeError::NotInstantiable(av.ty.name()))?;
        let desc = agg
            .host_key()
            .and_then(|key| self.env.descriptor(key))
            .ok_or_else(|| RuntimeError::NotInstantiable(agg.name().to_string()))?;

        match &desc.adapter {
            Some(HostAdapter::Pod { param, build }) => {
                let value = av.space.resolve_local(&param.name).unwrap_or(Value::None);
                let lowered = self.instantiate(&value)?;
                Ok(build(lowered)?)
            },
            Some(HostAdapter::Aggregate { params, build }) => {
                let lowered = params
                    .iter()
                    .map(|p| {
                        let value = av.space.resolve_local(&p.name).unwrap_or(Value::None);
                        self.instantiate(&value)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(build(lowered)?)
            },
            None => {
                let factory = desc
                    .factory
                    .as_ref()
                    .ok_or_else(|| RuntimeError::NotInstantiable(agg.name().to_string()))?;
                let object = factory();
                // push the populated members through, in declaration order
                let target =
                    MemorySpace::encapsulate(object.clone(), av.ty.clone(), self.env.clone());
                for member in agg.members() {
                    let Some(value) = av.space.resolve_local(member.name()) else { continue };
                    if let Value::Func(_) = &value {
                        let handle = self.instantiate(&value)?;
                        object.set_member(member.name(), handle)?;
                    } else {
                        target.set(member.name(), value)?;
                    }
                }
                Ok(HostValue::Object(object))
            },
        }
    }

    /// Evaluate an object definition: properties populate a fresh member
    /// space, then a registered host type is instantiated and re-wrapped so
    /// the value aliases the live object. The object is bound under its
    /// definition name in the current space.
    ///
    /// # Errors
    /// Unknown type names, property type mismatches, instantiation failures.
    pub fn eval_object_def(&self, def: &ObjectDef) -> Result<Value, RuntimeError> {
        let ty = self
            .env
            .lookup_type(&def.type_name)
            .ok_or_else(|| RuntimeError::UnknownIdentifier { name: def.type_name.clone() })?;
        let agg = ty
            .as_aggregate()
            .ok_or_else(|| RuntimeError::NotInstantiable(def.type_name.clone()))?;

        let space = MemorySpace::child_of(&self.current_space());
        self.push_space(space.clone());
        let populated: Result<(), RuntimeError> = def.properties.iter().try_for_each(|prop| {
            let member = agg.member(&prop.name).ok_or_else(|| RuntimeError::NoSuchMember {
                type_name: agg.name().to_string(),
                member: prop.name.clone(),
            })?;
            let value = self.eval(&prop.value)?;
            let value = match member.ty() {
                Some(member_ty) => {
                    self.env.coerce(&member_ty, value, &format!("property '{}'", prop.name))?
                },
                None => value,
            };
            space.bind(prop.name.clone(), value);
            Ok(())
        });
        self.pop_space();
        populated?;

        // the definition name doubles as the default display name
        if agg.member("name").is_some() && space.resolve_local("name").is_none() {
            space.bind("name", Value::Str(def.name.clone()));
        }

        let mut value = Value::Aggregate(AggregateValue { ty: ty.clone(), space });
        if agg.host_key().is_some_and(|key| self.env.descriptor(key).is_some()) {
            if let HostValue::Object(object) = self.instantiate(&value)? {
                value = Value::Aggregate(AggregateValue {
                    ty: ty.clone(),
                    space: MemorySpace::encapsulate(object, ty, self.env.clone()),
                });
            }
        }
        self.current_space().bind(def.name.clone(), value.clone());
        Ok(value)
    }

    /// Evaluate a graph definition over previously defined task objects.
    /// A bad edge (unknown node, unsupported type attribute, duplicate) is
    /// logged and skipped; the rest of the graph still builds. An edge
    /// `a -> b` makes `b` depend on `a`.
    ///
    /// # Errors
    /// Currently none beyond node expression evaluation; kept fallible for
    /// symmetry with the other definition forms.
    pub fn eval_graph_def(&self, def: &GraphDef) -> Result<Value, RuntimeError> {
        let mut graph = TaskDependencyGraph::new();
        let space = self.current_space();

        for stmt in &def.edges {
            let kind = match stmt.attributes.iter().find(|(k, _)| k == "type") {
                Some((_, spelling)) => match spelling.parse::<EdgeKind>() {
                    Ok(kind) => kind,
                    Err(err) => {
                        warn!("graph '{}' line {}: {err}", def.name, stmt.src_line);
                        continue;
                    },
                },
                None => EdgeKind::Sequence,
            };

            let mut indices = Vec::with_capacity(stmt.nodes.len());
            let mut resolved = true;
            for node_name in &stmt.nodes {
                let handle = space.resolve(node_name).and_then(|value| match value {
                    Value::Aggregate(av) => av.space.host_object().and_then(|h| task_handle(&h)),
                    _ => None,
                });
                match handle {
                    Some(handle) => indices.push(graph.add_task(handle)),
                    None => {
                        warn!(
                            "graph '{}' line {}: '{node_name}' is not a task",
                            def.name, stmt.src_line
                        );
                        resolved = false;
                        break;
                    },
                }
            }
            if !resolved {
                continue;
            }

            for hop in indices.windows(2) {
                // the later node in the chain is the dependent one
                if let Err(err) = graph.add_edge(kind, hop[1], hop[0]) {
                    warn!("graph '{}' line {}: {err}", def.name, stmt.src_line);
                }
            }
        }

        let value = Value::Graph(graph);
        space.bind(def.name.clone(), value.clone());
        Ok(value)
    }
}

fn eval_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    use BinaryOp::{Add, And, Div, Eq, Greater, GreaterEq, Less, LessEq, Mul, NotEq, Or, Sub};

    let invalid = || RuntimeError::InvalidOperands {
        op: match op {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Eq => "==",
            NotEq => "!=",
            Less => "<",
            LessEq => "<=",
            Greater => ">",
            GreaterEq => ">=",
            And => "and",
            Or => "or",
        },
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    };

    #[allow(clippy::cast_precision_loss)]
    let as_floats = |a: &Value, b: &Value| match (a, b) {
        (Value::Float(x), Value::Float(y)) => Some((*x, *y)),
        (Value::Float(x), Value::Int(y)) => Some((*x, *y as f64)),
        (Value::Int(x), Value::Float(y)) => Some((*x as f64, *y)),
        _ => None,
    };

    match op {
        Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => as_floats(lhs, rhs).map(|(a, b)| Value::Float(a + b)).ok_or_else(invalid),
        },
        Sub => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => as_floats(lhs, rhs).map(|(a, b)| Value::Float(a - b)).ok_or_else(invalid),
        },
        Mul => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            _ => as_floats(lhs, rhs).map(|(a, b)| Value::Float(a * b)).ok_or_else(invalid),
        },
        Div => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) if *b != 0 => Ok(Value::Int(a / b)),
            (Value::Int(_), Value::Int(_)) => Err(RuntimeError::InvalidOperands {
                op: "/",
                lhs: lhs.type_name(),
                rhs: "zero".into(),
            }),
            _ => as_floats(lhs, rhs).map(|(a, b)| Value::Float(a / b)).ok_or_else(invalid),
        },
        Eq | NotEq => {
            let equal = match (lhs, rhs) {
                (Value::None, Value::None) => true,
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => match as_floats(lhs, rhs) {
                    Some((a, b)) => (a - b).abs() < f64::EPSILON,
                    None => return Err(invalid()),
                },
            };
            Ok(Value::Bool(if matches!(op, Eq) { equal } else { !equal }))
        },
        Less | LessEq | Greater | GreaterEq => {
            let (a, b) = match (lhs, rhs) {
                #[allow(clippy::cast_precision_loss)]
                (Value::Int(a), Value::Int(b)) => (*a as f64, *b as f64),
                _ => as_floats(lhs, rhs).ok_or_else(invalid)?,
            };
            Ok(Value::Bool(match op {
                Less => a < b,
                LessEq => a <= b,
                Greater => a > b,
                _ => a >= b,
            }))
        },
        And | Or => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => {
                Ok(Value::Bool(if matches!(op, And) { *a && *b } else { *a || *b }))
            },
            _ => Err(invalid()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PropertyDef;
    use crate::environment::default_environment;

    fn interpreter() -> Interpreter {
        Interpreter::new(default_environment().expect("bootstrap"))
    }

    fn task_def(name: &str) -> Node {
        Node::ObjectDef(Rc::new(ObjectDef {
            type_name: "task".into(),
            name: name.into(),
            properties: vec![PropertyDef {
                name: "points".into(),
                value: Node::Int(2),
                src_line: 1,
            }],
            src_line: 1,
        }))
    }

    #[test]
    fn arithmetic_promotes_int_to_float() {
        let interp = interpreter();
        let sum = interp
            .eval(&Node::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Node::Int(1)),
                rhs: Box::new(Node::Float(0.5)),
            })
            .expect("eval");
        assert!(matches!(sum, Value::Float(v) if (v - 1.5).abs() < f64::EPSILON));
    }

    #[test]
    fn object_definition_instantiates_a_live_task() {
        let interp = interpreter();
        let value = interp.eval(&task_def("find_the_amulet")).expect("eval");
        let Value::Aggregate(av) = value else { panic!("expected aggregate") };
        let handle =
            task_handle(&av.space.host_object().expect("host backed")).expect("task handle");
        assert_eq!(handle.borrow().name, "find_the_amulet");
        assert!((handle.borrow().points - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn graph_definition_collects_tasks_and_edges() {
        let interp = interpreter();
        interp.eval(&task_def("a")).expect("task a");
        interp.eval(&task_def("b")).expect("task b");
        let value = interp
            .eval(&Node::GraphDef(Rc::new(GraphDef {
                name: "g".into(),
                edges: vec![crate::ast::GraphEdgeStmt {
                    nodes: vec!["a".into(), "b".into()],
                    attributes: vec![("type".into(), "seq".into())],
                    src_line: 3,
                }],
                src_line: 2,
            })))
            .expect("graph");
        let Value::Graph(graph) = value else { panic!("expected graph") };
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges().len(), 1);
        // b comes later in the chain, so b is the dependent task
        assert_eq!(graph.edges()[0].source, 1);
        assert_eq!(graph.edges()[0].target, 0);
        assert_eq!(graph.edges()[0].kind, EdgeKind::Sequence);
    }

    #[test]
    fn bad_edges_are_skipped_without_poisoning_the_graph() {
        let interp = interpreter();
        interp.eval(&task_def("a")).expect("task a");
        interp.eval(&task_def("b")).expect("task b");
        let value = interp
            .eval(&Node::GraphDef(Rc::new(GraphDef {
                name: "g".into(),
                edges: vec![
                    crate::ast::GraphEdgeStmt {
                        nodes: vec!["a".into(), "nowhere".into()],
                        attributes: vec![],
                        src_line: 3,
                    },
                    crate::ast::GraphEdgeStmt {
                        nodes: vec!["a".into(), "b".into()],
                        attributes: vec![("type".into(), "parallel".into())],
                        src_line: 4,
                    },
                    crate::ast::GraphEdgeStmt {
                        nodes: vec!["a".into(), "b".into()],
                        attributes: vec![("type".into(), "seq_or".into())],
                        src_line: 5,
                    },
                ],
                src_line: 2,
            })))
            .expect("graph");
        let Value::Graph(graph) = value else { panic!("expected graph") };
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].kind, EdgeKind::SequenceOr);
    }

    #[test]
    fn member_assignment_writes_through_to_the_host() {
        let interp = interpreter();
        let value = interp.eval(&task_def("gate")).expect("task");
        interp.current_space().bind("t", value);
        interp
            .eval(&Node::Assign {
                target: Box::new(Node::member(Node::id("t"), "name")),
                value: Box::new(Node::string("renamed")),
            })
            .expect("assign");
        let Some(Value::Aggregate(av)) = interp.current_space().resolve("t") else {
            panic!("task still bound")
        };
        let handle =
            task_handle(&av.space.host_object().expect("host backed")).expect("task handle");
        assert_eq!(handle.borrow().name, "renamed");
    }

    #[test]
    fn unknown_member_assignment_is_an_error() {
        let interp = interpreter();
        let value = interp.eval(&task_def("gate")).expect("task");
        interp.current_space().bind("t", value);
        let result = interp.eval(&Node::Assign {
            target: Box::new(Node::member(Node::id("t"), "hitpoints")),
            value: Box::new(Node::Int(1)),
        });
        assert!(matches!(result, Err(RuntimeError::NoSuchMember { .. })));
    }

    #[test]
    fn for_in_iterates_and_returns_unwind() {
        let interp = interpreter();
        interp.current_space().bind("total", Value::Int(0));
        let body = vec![Node::Assign {
            target: Box::new(Node::id("total")),
            value: Box::new(Node::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Node::id("total")),
                rhs: Box::new(Node::id("x")),
            }),
        }];
        interp
            .eval(&Node::ForIn {
                var: "x".into(),
                iterable: Box::new(Node::ListLit(vec![Node::Int(1), Node::Int(2), Node::Int(3)])),
                body,
            })
            .expect("loop");
        assert!(matches!(interp.current_space().resolve("total"), Some(Value::Int(6))));
    }

    #[test]
    fn state_property_reads_and_writes_through() {
        let interp = interpreter();
        let value = interp.eval(&task_def("gate")).expect("task");
        interp.current_space().bind("t", value);
        interp
            .eval(&Node::Assign {
                target: Box::new(Node::member(Node::id("t"), "state")),
                value: Box::new(Node::string("finished_correct")),
            })
            .expect("assign state");
        let read = interp.eval(&Node::member(Node::id("t"), "state")).expect("read state");
        assert!(matches!(read, Value::Str(s) if s == "finished_correct"));
    }
}
