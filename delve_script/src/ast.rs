//! AST contract --
//!
//! Parsing is out of scope for this crate: a front end hands programs over in
//! this shape and the analyzer/interpreter dispatch on node kind only.
//! Definition nodes carry their source line so diagnostics and entry points
//! can point back at the script.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A typed function parameter. Container types spell their element type with
/// a `[]` (list) or `<>` (set) suffix, e.g. `string<>`.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub type_name: String,
}

/// A user-defined function.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub return_type: Option<String>,
    pub body: Vec<Node>,
    pub src_line: usize,
}

/// One `name: expression` entry inside an object definition.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub value: Node,
    pub src_line: usize,
}

/// A typed, named object definition: `task open_gate { ... }`.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub type_name: String,
    pub name: String,
    pub properties: Vec<PropertyDef>,
    pub src_line: usize,
}

/// One edge statement in a graph definition. A chain `a -> b -> c` carries
/// all its node names in order; attributes apply to every hop of the chain.
#[derive(Debug, Clone)]
pub struct GraphEdgeStmt {
    pub nodes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub src_line: usize,
}

/// A named dependency graph definition: `graph g { a -> b [type = seq] }`.
#[derive(Debug, Clone)]
pub struct GraphDef {
    pub name: String,
    pub edges: Vec<GraphEdgeStmt>,
    pub src_line: usize,
}

#[derive(Debug, Clone)]
pub enum Node {
    Program(Vec<Node>),
    ObjectDef(Rc<ObjectDef>),
    GraphDef(Rc<GraphDef>),
    FuncDef(Rc<FuncDef>),

    // statements
    VarDecl {
        name: String,
        init: Option<Box<Node>>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Return(Option<Box<Node>>),
    If {
        condition: Box<Node>,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
    ForIn {
        var: String,
        iterable: Box<Node>,
        body: Vec<Node>,
    },

    // expressions
    Call {
        name: String,
        args: Vec<Node>,
        src_line: usize,
    },
    Member {
        receiver: Box<Node>,
        name: String,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    ListLit(Vec<Node>),
    SetLit(Vec<Node>),
    Id {
        name: String,
        src_line: usize,
    },
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Node {
    /// Identifier expression without a meaningful source position.
    pub fn id(name: impl Into<String>) -> Self {
        Node::Id { name: name.into(), src_line: 0 }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Str(value.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Call { name: name.into(), args, src_line: 0 }
    }

    pub fn member(receiver: Node, name: impl Into<String>) -> Self {
        Node::Member { receiver: Box::new(receiver), name: name.into() }
    }
}
