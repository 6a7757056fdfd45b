//! End-to-end tests: a whole quest script (tasks, functions, graph, config)
//! interpreted into a `Config`, and the callback bridge exercised from the
//! host side.

use std::rc::Rc;

use delve_model::{EdgeKind, TaskState, compile};
use delve_script::ast::{
    FuncDef, GraphDef, GraphEdgeStmt, Node, ObjectDef, ParamDef, PropertyDef,
};
use delve_script::entrypoint::{ParsedFile, find_entry_points};
use delve_script::host::{HostValue, TaskBinding, task_handle};
use delve_script::semantic::{Callable, analyze};
use delve_script::{Interpreter, Value, default_environment};

fn prop(name: &str, value: Node) -> PropertyDef {
    PropertyDef { name: name.into(), value, src_line: 0 }
}

fn object(type_name: &str, name: &str, properties: Vec<PropertyDef>) -> Node {
    Node::ObjectDef(Rc::new(ObjectDef {
        type_name: type_name.into(),
        name: name.into(),
        properties,
        src_line: 0,
    }))
}

fn func(name: &str, params: Vec<(&str, &str)>, return_type: Option<&str>, body: Vec<Node>) -> Node {
    Node::FuncDef(Rc::new(FuncDef {
        name: name.into(),
        params: params
            .into_iter()
            .map(|(name, type_name)| ParamDef { name: name.into(), type_name: type_name.into() })
            .collect(),
        return_type: return_type.map(Into::into),
        body,
        src_line: 0,
    }))
}

fn graph(name: &str, edges: Vec<(Vec<&str>, Option<&str>)>) -> Node {
    Node::GraphDef(Rc::new(GraphDef {
        name: name.into(),
        edges: edges
            .into_iter()
            .map(|(nodes, kind)| GraphEdgeStmt {
                nodes: nodes.into_iter().map(Into::into).collect(),
                attributes: kind.map(|k| ("type".to_string(), k.to_string())).into_iter().collect(),
                src_line: 0,
            })
            .collect(),
        src_line: 0,
    }))
}

/// A small but complete quest script.
fn escape_quest() -> Node {
    Node::Program(vec![
        func(
            "grade",
            vec![("t", "task"), ("answers", "string<>")],
            Some("float"),
            vec![Node::Return(Some(Box::new(Node::Binary {
                op: delve_script::ast::BinaryOp::Add,
                lhs: Box::new(Node::member(Node::id("t"), "points")),
                rhs: Box::new(Node::Float(1.0)),
            })))],
        ),
        func(
            "announce",
            vec![("t", "task")],
            None,
            vec![Node::Assign {
                target: Box::new(Node::member(Node::id("t"), "points")),
                value: Box::new(Node::Float(10.0)),
            }],
        ),
        object(
            "task",
            "find_key",
            vec![
                prop("points", Node::Int(2)),
                prop("on_activate", Node::id("announce")),
                prop("scoring_function", Node::id("grade")),
            ],
        ),
        object("task", "open_gate", vec![prop("points", Node::Int(3))]),
        graph("deps", vec![(vec!["find_key", "open_gate"], Some("seq"))]),
        object(
            "quest_config",
            "escape",
            vec![
                prop("name", Node::string("Escape the Dungeon")),
                prop("dependency_graph", Node::id("deps")),
                prop("quest_desc", Node::string("Find the key, open the gate.")),
                prop("quest_points", Node::Int(42)),
            ],
        ),
    ])
}

#[test]
fn whole_script_interprets_into_a_config() {
    let file = ParsedFile::new("escape.dng", escape_quest());
    let entries = find_entry_points(std::slice::from_ref(&file));
    assert_eq!(entries.len(), 1);
    let entry = entries[0].as_ref().expect("well-formed entry point");
    assert_eq!(entry.display_name, "escape");

    let interp = Interpreter::new(default_environment().expect("bootstrap"));
    let config = interp.interpret_entry_point(entry).expect("interprets");

    assert_eq!(config.display_name, "Escape the Dungeon");
    assert_eq!(config.description, "Find the key, open the gate.");
    assert_eq!(config.points, 42);
    assert!(config.level_graph.is_none());

    let graph = &config.dependency_graph;
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.edges()[0].kind, EdgeKind::Sequence);
    // open_gate comes later in the chain, so it depends on find_key
    let dependent = graph.task(graph.edges()[0].source).expect("dependent task");
    assert_eq!(dependent.borrow().name, "open_gate");
}

#[test]
fn interpreted_graph_compiles_into_petri_nets() {
    let file = ParsedFile::new("escape.dng", escape_quest());
    let entries = find_entry_points(std::slice::from_ref(&file));
    let entry = entries[0].as_ref().expect("entry point");

    let interp = Interpreter::new(default_environment().expect("bootstrap"));
    let config = interp.interpret_entry_point(entry).expect("interprets");

    let nets = compile(&config.dependency_graph);
    assert_eq!(nets.len(), 2);
    // the first task has no dependencies and can activate right away
    nets[0].activate_task().fire();
    assert_eq!(
        config.dependency_graph.task(0).expect("find_key").borrow().state(),
        TaskState::Active
    );
}

#[test]
fn repeated_interpretation_yields_independent_instances() {
    let file = ParsedFile::new("escape.dng", escape_quest());
    let entries = find_entry_points(std::slice::from_ref(&file));
    let entry = entries[0].as_ref().expect("entry point");

    let interp = Interpreter::new(default_environment().expect("bootstrap"));
    let first = interp.interpret_entry_point(entry).expect("first run");
    let second = interp.interpret_entry_point(entry).expect("second run");

    let first_id = first.dependency_graph.task(0).expect("task").borrow().id;
    let second_id = second.dependency_graph.task(0).expect("task").borrow().id;
    assert_ne!(first_id, second_id);
}

#[test]
fn two_entry_points_in_one_file_interpret_independently() {
    let file = ParsedFile::new(
        "double.dng",
        Node::Program(vec![
            object("task", "dig", vec![prop("points", Node::Int(1))]),
            object("task", "climb", vec![prop("points", Node::Int(2))]),
            graph("both", vec![(vec!["dig", "climb"], Some("seq"))]),
            graph("solo", vec![(vec!["dig"], None)]),
            object(
                "quest_config",
                "cfg_one",
                vec![
                    prop("name", Node::string("Cfg1")),
                    prop("dependency_graph", Node::id("both")),
                ],
            ),
            object(
                "quest_config",
                "cfg_two",
                vec![
                    prop("name", Node::string("Cfg2")),
                    prop("dependency_graph", Node::id("solo")),
                ],
            ),
        ]),
    );
    let entries = find_entry_points(std::slice::from_ref(&file));
    assert_eq!(entries.len(), 2);

    let interp = Interpreter::new(default_environment().expect("bootstrap"));
    let first = interp
        .interpret_entry_point(entries[0].as_ref().expect("first entry"))
        .expect("first config");
    let second = interp
        .interpret_entry_point(entries[1].as_ref().expect("second entry"))
        .expect("second config");

    assert_eq!(first.display_name, "Cfg1");
    assert_eq!(second.display_name, "Cfg2");
    assert_eq!(first.dependency_graph.node_count(), 2);
    assert_eq!(first.dependency_graph.edges().len(), 1);
    assert_eq!(second.dependency_graph.node_count(), 1);
    assert!(second.dependency_graph.edges().is_empty());

    // each interpretation instantiates its own tasks
    let first_dig = first.dependency_graph.task(0).expect("dig in first").borrow().id;
    let second_dig = second.dependency_graph.task(0).expect("dig in second").borrow().id;
    assert_ne!(first_dig, second_dig);
}

#[test]
fn scoring_callback_crosses_the_host_boundary() {
    let env = default_environment().expect("bootstrap");
    let interp = Interpreter::new(env.clone());
    let program = escape_quest();
    let analysis = analyze(&env, &program).expect("analysis");
    for function in &analysis.functions {
        interp
            .global_space()
            .bind(function.name.clone(), Value::Func(Callable::Function(function.clone())));
    }

    let Node::Program(nodes) = &program else { panic!("program") };
    let task_node = &nodes[2];
    let value = interp.eval(task_node).expect("task evaluates");
    let Value::Aggregate(av) = value else { panic!("expected aggregate") };
    let object = av.space.host_object().expect("host backed");
    let binding = object.as_any().downcast_ref::<TaskBinding>().expect("task binding");

    let scoring = binding.callback("scoring_function").expect("scoring callback attached");
    let result = scoring
        .invoke(&[
            HostValue::Object(object.clone()),
            HostValue::Set(vec![HostValue::Str("a key".into())]),
        ])
        .expect("callback runs");
    // points 2 plus 1
    assert!(matches!(result, HostValue::Float(v) if (v - 3.0).abs() < f64::EPSILON));

    // the consumer callback mutates the shared task through its argument
    let on_activate = binding.callback("on_activate").expect("activation callback");
    on_activate
        .invoke(&[HostValue::Object(object.clone())])
        .expect("callback runs");
    let handle = task_handle(&object).expect("task handle");
    assert!((handle.borrow().points - 10.0).abs() < f32::EPSILON);
}

#[test]
fn callbacks_reject_the_wrong_arity() {
    let env = default_environment().expect("bootstrap");
    let interp = Interpreter::new(env.clone());
    let program = escape_quest();
    let analysis = analyze(&env, &program).expect("analysis");
    for function in &analysis.functions {
        interp
            .global_space()
            .bind(function.name.clone(), Value::Func(Callable::Function(function.clone())));
    }
    let Node::Program(nodes) = &program else { panic!("program") };
    let value = interp.eval(&nodes[2]).expect("task evaluates");
    let Value::Aggregate(av) = value else { panic!("expected aggregate") };
    let object = av.space.host_object().expect("host backed");
    let binding = object.as_any().downcast_ref::<TaskBinding>().expect("task binding");

    let scoring = binding.callback("scoring_function").expect("scoring callback");
    assert!(scoring.invoke(&[HostValue::Object(object.clone())]).is_err());
}
