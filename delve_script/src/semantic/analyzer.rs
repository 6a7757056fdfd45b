//! Program analysis --
//!
//! Two passes over a program before interpretation. The first binds every
//! top-level definition into a fresh file scope (a child of the global
//! scope), so re-analyzing a file never collides with an earlier run. The
//! second resolves identifiers, checks object properties against their
//! aggregate's members, and walks function bodies.

use std::rc::Rc;

use crate::ast::{FuncDef, GraphDef, Node, ObjectDef};
use crate::environment::Environment;
use crate::host::HostTypeExpr;
use crate::semantic::SemanticError;
use crate::semantic::scope::{Callable, FunctionSymbol, Scope, ScopeRef, Symbol};
use crate::semantic::types::{BuiltIn, FunctionType, Type, TypeRef};

/// The result of analyzing one program: its file scope and the functions it
/// defines, ready to be bound into a memory space.
pub struct Analysis {
    pub scope: ScopeRef,
    pub functions: Vec<Rc<FunctionSymbol>>,
}

/// Bind and check a program against an environment.
///
/// # Errors
/// The first [`SemanticError`] the walk encounters.
pub fn analyze(env: &Environment, program: &Node) -> Result<Analysis, SemanticError> {
    let Node::Program(nodes) = program else {
        // single-node programs are legal, wrap them
        return analyze(env, &Node::Program(vec![program.clone()]));
    };

    let scope = Scope::child_of(env.global_scope());
    let mut functions = Vec::new();

    for node in nodes {
        match node {
            Node::FuncDef(def) => {
                let symbol = bind_function(env, &scope, def)?;
                functions.push(symbol);
            },
            Node::ObjectDef(def) => {
                let ty = resolve_aggregate(&scope, &def.type_name, def.src_line)?;
                scope.bind(Symbol::value(def.name.clone(), ty))?;
            },
            Node::GraphDef(def) => {
                let graph_ty = resolve_type(env, &scope, "graph", def.src_line)?;
                scope.bind(Symbol::value(def.name.clone(), graph_ty))?;
            },
            _ => {},
        }
    }

    for node in nodes {
        match node {
            Node::FuncDef(def) => check_function(env, &scope, def)?,
            Node::ObjectDef(def) => check_object(&scope, def)?,
            Node::GraphDef(def) => check_graph(&scope, def)?,
            other => check_stmt(&scope, other)?,
        }
    }

    Ok(Analysis { scope, functions })
}

fn bind_function(
    env: &Environment,
    scope: &ScopeRef,
    def: &Rc<FuncDef>,
) -> Result<Rc<FunctionSymbol>, SemanticError> {
    let params = def
        .params
        .iter()
        .map(|p| resolve_type(env, scope, &p.type_name, def.src_line))
        .collect::<Result<Vec<_>, _>>()?;
    let ret = match &def.return_type {
        Some(name) => resolve_type(env, scope, name, def.src_line)?,
        None => Type::builtin(BuiltIn::None),
    };
    let symbol = Rc::new(FunctionSymbol {
        name: def.name.clone(),
        ty: Rc::new(FunctionType { params, ret }),
        def: def.clone(),
    });
    scope.bind(Symbol::callable(Callable::Function(symbol.clone())))?;
    Ok(symbol)
}

/// Resolve a spelled type name, honoring `[]` (list) and `<>` (set)
/// suffixes, e.g. `string<>` or `task[]`.
fn resolve_type(
    env: &Environment,
    scope: &ScopeRef,
    spelling: &str,
    src_line: usize,
) -> Result<TypeRef, SemanticError> {
    fn parse(spelling: &str) -> HostTypeExpr {
        if let Some(inner) = spelling.strip_suffix("[]") {
            HostTypeExpr::List(Box::new(parse(inner)))
        } else if let Some(inner) = spelling.strip_suffix("<>") {
            HostTypeExpr::Set(Box::new(parse(inner)))
        } else {
            HostTypeExpr::named(spelling)
        }
    }
    env.type_builder()
        .resolve_expr(&parse(spelling), scope, "type annotation")
        .map_err(|_| SemanticError::NotAType { name: spelling.to_string(), src_line })
}

fn resolve_aggregate(
    scope: &ScopeRef,
    name: &str,
    src_line: usize,
) -> Result<TypeRef, SemanticError> {
    let symbol = scope
        .resolve(name)
        .ok_or_else(|| SemanticError::UnknownSymbol { name: name.to_string(), src_line })?;
    if !symbol.is_type() {
        return Err(SemanticError::NotAType { name: name.to_string(), src_line });
    }
    let ty = symbol
        .ty()
        .ok_or_else(|| SemanticError::NotAType { name: name.to_string(), src_line })?;
    if ty.as_aggregate().is_none() {
        return Err(SemanticError::NotAggregate { name: name.to_string(), src_line });
    }
    Ok(ty)
}

fn check_function(env: &Environment, scope: &ScopeRef, def: &FuncDef) -> Result<(), SemanticError> {
    let body_scope = Scope::child_of(scope);
    for param in &def.params {
        let ty = resolve_type(env, &body_scope, &param.type_name, def.src_line)?;
        body_scope.bind(Symbol::value(param.name.clone(), ty))?;
    }
    check_block(&body_scope, &def.body)
}

/// Object properties must name declared members of the aggregate; a typo in
/// a property name is a hard error, not a silently ignored extra.
fn check_object(scope: &ScopeRef, def: &ObjectDef) -> Result<(), SemanticError> {
    let ty = resolve_aggregate(scope, &def.type_name, def.src_line)?;
    let Type::Aggregate(agg) = &*ty else {
        return Err(SemanticError::NotAggregate {
            name: def.type_name.clone(),
            src_line: def.src_line,
        });
    };
    let property_scope = Scope::child_of(scope);
    for prop in &def.properties {
        if agg.member(&prop.name).is_none() {
            return Err(SemanticError::UnknownSymbol {
                name: format!("{}.{}", def.type_name, prop.name),
                src_line: prop.src_line,
            });
        }
        check_expr(&property_scope, &prop.value)?;
        // later properties may refer to earlier ones
        if property_scope.resolve_local(&prop.name).is_none() {
            property_scope.bind(Symbol::value(
                prop.name.clone(),
                Type::builtin(BuiltIn::None),
            ))?;
        }
    }
    Ok(())
}

fn check_graph(scope: &ScopeRef, def: &GraphDef) -> Result<(), SemanticError> {
    for stmt in &def.edges {
        for node in &stmt.nodes {
            if scope.resolve(node).is_none() {
                return Err(SemanticError::UnknownSymbol {
                    name: node.clone(),
                    src_line: stmt.src_line,
                });
            }
        }
    }
    Ok(())
}

fn check_block(scope: &ScopeRef, body: &[Node]) -> Result<(), SemanticError> {
    let block_scope = Scope::child_of(scope);
    for node in body {
        check_stmt(&block_scope, node)?;
    }
    Ok(())
}

fn check_stmt(scope: &ScopeRef, node: &Node) -> Result<(), SemanticError> {
    match node {
        Node::VarDecl { name, init } => {
            if let Some(init) = init {
                check_expr(scope, init)?;
            }
            if scope.resolve_local(name).is_none() {
                scope.bind(Symbol::value(
                    name.clone(),
                    Type::builtin(BuiltIn::None),
                ))?;
            }
            Ok(())
        },
        Node::Assign { target, value } => {
            // assigning to a fresh name binds it, so only a member target's
            // receiver needs to resolve
            if let Node::Member { receiver, .. } = &**target {
                check_expr(scope, receiver)?;
            }
            check_expr(scope, value)?;
            if let Node::Id { name, .. } = &**target {
                if scope.resolve(name).is_none() {
                    scope.bind(Symbol::value(
                        name.clone(),
                        Type::builtin(BuiltIn::None),
                    ))?;
                }
            }
            Ok(())
        },
        Node::Return(expr) => match expr {
            Some(expr) => check_expr(scope, expr),
            None => Ok(()),
        },
        Node::If { condition, then_body, else_body } => {
            check_expr(scope, condition)?;
            check_block(scope, then_body)?;
            check_block(scope, else_body)
        },
        Node::ForIn { var, iterable, body } => {
            check_expr(scope, iterable)?;
            let loop_scope = Scope::child_of(scope);
            loop_scope.bind(Symbol::value(
                var.clone(),
                Type::builtin(BuiltIn::None),
            ))?;
            for stmt in body {
                check_stmt(&loop_scope, stmt)?;
            }
            Ok(())
        },
        expr => check_expr(scope, expr),
    }
}

fn check_expr(scope: &ScopeRef, node: &Node) -> Result<(), SemanticError> {
    match node {
        Node::Id { name, src_line } => scope
            .resolve(name)
            .map(|_| ())
            .ok_or_else(|| SemanticError::UnknownSymbol { name: name.clone(), src_line: *src_line }),
        Node::Call { name, args, src_line } => {
            if scope.resolve(name).is_none() {
                return Err(SemanticError::UnknownSymbol {
                    name: name.clone(),
                    src_line: *src_line,
                });
            }
            for arg in args {
                check_expr(scope, arg)?;
            }
            Ok(())
        },
        // member names resolve at runtime against the receiver's space
        Node::Member { receiver, .. } => check_expr(scope, receiver),
        Node::Binary { lhs, rhs, .. } => {
            check_expr(scope, lhs)?;
            check_expr(scope, rhs)
        },
        Node::Unary { operand, .. } => check_expr(scope, operand),
        Node::ListLit(items) | Node::SetLit(items) => {
            for item in items {
                check_expr(scope, item)?;
            }
            Ok(())
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ParamDef, PropertyDef};
    use crate::environment::default_environment;

    fn task_def(name: &str) -> Node {
        Node::ObjectDef(Rc::new(ObjectDef {
            type_name: "task".into(),
            name: name.into(),
            properties: vec![],
            src_line: 1,
        }))
    }

    #[test]
    fn definitions_bind_into_a_fresh_file_scope() {
        let env = default_environment().expect("bootstrap");
        let program = Node::Program(vec![task_def("a")]);
        let first = analyze(&env, &program).expect("first analysis");
        let second = analyze(&env, &program).expect("second analysis");
        assert!(first.scope.resolve_local("a").is_some());
        assert!(second.scope.resolve_local("a").is_some());
        // the global scope stays untouched
        assert!(env.global_scope().resolve("a").is_none());
    }

    #[test]
    fn function_signature_resolves_container_suffixes() {
        let env = default_environment().expect("bootstrap");
        let program = Node::Program(vec![Node::FuncDef(Rc::new(FuncDef {
            name: "score".into(),
            params: vec![
                ParamDef { name: "t".into(), type_name: "task".into() },
                ParamDef { name: "answers".into(), type_name: "string<>".into() },
            ],
            return_type: Some("float".into()),
            body: vec![Node::Return(Some(Box::new(Node::Float(1.0))))],
            src_line: 1,
        }))]);
        let analysis = analyze(&env, &program).expect("analysis");
        assert_eq!(analysis.functions.len(), 1);
        assert_eq!(analysis.functions[0].ty.type_name(), "fn_(task,string<>)->float");
    }

    #[test]
    fn unknown_object_property_is_rejected() {
        let env = default_environment().expect("bootstrap");
        let program = Node::Program(vec![Node::ObjectDef(Rc::new(ObjectDef {
            type_name: "task".into(),
            name: "t".into(),
            properties: vec![PropertyDef {
                name: "hitpoints".into(),
                value: Node::Int(5),
                src_line: 2,
            }],
            src_line: 1,
        }))]);
        assert!(matches!(
            analyze(&env, &program),
            Err(SemanticError::UnknownSymbol { src_line: 2, .. })
        ));
    }

    #[test]
    fn graph_nodes_must_be_defined() {
        let env = default_environment().expect("bootstrap");
        let program = Node::Program(vec![
            task_def("a"),
            Node::GraphDef(Rc::new(GraphDef {
                name: "g".into(),
                edges: vec![crate::ast::GraphEdgeStmt {
                    nodes: vec!["a".into(), "ghost".into()],
                    attributes: vec![],
                    src_line: 4,
                }],
                src_line: 3,
            })),
        ]);
        assert!(matches!(
            analyze(&env, &program),
            Err(SemanticError::UnknownSymbol { src_line: 4, .. })
        ));
    }

    #[test]
    fn duplicate_definitions_collide() {
        let env = default_environment().expect("bootstrap");
        let program = Node::Program(vec![task_def("a"), task_def("a")]);
        assert!(matches!(
            analyze(&env, &program),
            Err(SemanticError::DuplicateSymbol { .. })
        ));
    }

    #[test]
    fn unknown_identifier_in_function_body_is_rejected() {
        let env = default_environment().expect("bootstrap");
        let program = Node::Program(vec![Node::FuncDef(Rc::new(FuncDef {
            name: "f".into(),
            params: vec![],
            return_type: None,
            body: vec![Node::Return(Some(Box::new(Node::Id {
                name: "missing".into(),
                src_line: 7,
            })))],
            src_line: 1,
        }))]);
        assert!(matches!(
            analyze(&env, &program),
            Err(SemanticError::UnknownSymbol { src_line: 7, .. })
        ));
    }
}
