//! Entry points --
//!
//! A quest script's outer surface is its `quest_config` blocks: each one is
//! an entry point the game can list and interpret on its own. Interpretation
//! of an entry point evaluates the surrounding file's definitions in order
//! and produces a [`Config`] snapshot for the game to load.

use std::any::Any;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

use delve_model::TaskDependencyGraph;

use crate::ast::{Node, ObjectDef};
use crate::host::{HostAccessError, HostInstance, HostValue};
use crate::runtime::RuntimeError;
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::{MemorySpace, Value};
use crate::semantic::SemanticError;
use crate::semantic::analyzer::analyze;
use crate::semantic::scope::Callable;

/// The object type that marks an entry point.
pub const ENTRY_POINT_TYPE: &str = "quest_config";

/// A program together with the path it was parsed from.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub program: Node,
}

impl ParsedFile {
    pub fn new(path: impl Into<PathBuf>, program: Node) -> Rc<Self> {
        Rc::new(Self { path: path.into(), program })
    }
}

/// One interpretable `quest_config` block.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub file: Rc<ParsedFile>,
    pub object: Rc<ObjectDef>,
    /// The object identifier; the `name` property overrides it at
    /// interpretation time.
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryPointError {
    #[error("malformed entry point in {path} (line {src_line}): missing name")]
    MalformedEntryPoint { path: String, src_line: usize },
}

/// Scan parsed files for entry points, in declaration order. A malformed
/// block yields an error entry without hiding the rest.
pub fn find_entry_points(files: &[Rc<ParsedFile>]) -> Vec<Result<EntryPoint, EntryPointError>> {
    let mut found = Vec::new();
    for file in files {
        let Node::Program(nodes) = &file.program else { continue };
        for node in nodes {
            let Node::ObjectDef(def) = node else { continue };
            if def.type_name != ENTRY_POINT_TYPE {
                continue;
            }
            if def.name.trim().is_empty() {
                found.push(Err(EntryPointError::MalformedEntryPoint {
                    path: file.path.display().to_string(),
                    src_line: def.src_line,
                }));
            } else {
                found.push(Ok(EntryPoint {
                    file: file.clone(),
                    object: def.clone(),
                    display_name: def.name.clone(),
                }));
            }
        }
    }
    found
}

/// The interpreted form of one entry point, ready for the game to load.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub display_name: String,
    pub dependency_graph: TaskDependencyGraph,
    pub level_graph: Option<TaskDependencyGraph>,
    pub description: String,
    pub points: i64,
}

/// Host binding backing `quest_config` objects during interpretation.
/// Clones alias the same config.
#[derive(Debug, Clone, Default)]
pub struct ConfigBinding {
    config: Rc<RefCell<Config>>,
}

impl ConfigBinding {
    pub const TYPE_NAME: &'static str = ENTRY_POINT_TYPE;

    pub fn config(&self) -> Config {
        self.config.borrow().clone()
    }
}

impl HostInstance for ConfigBinding {
    fn type_key(&self) -> &str {
        Self::TYPE_NAME
    }

    fn get_member(&self, name: &str) -> Option<HostValue> {
        let config = self.config.borrow();
        match name {
            "name" => Some(HostValue::Str(config.display_name.clone())),
            "dependency_graph" => Some(HostValue::Graph(config.dependency_graph.clone())),
            "level_graph" => Some(
                config.level_graph.clone().map_or(HostValue::None, HostValue::Graph),
            ),
            "quest_desc" => Some(HostValue::Str(config.description.clone())),
            "quest_points" => Some(HostValue::Int(config.points)),
            _ => None,
        }
    }

    fn set_member(&self, name: &str, value: HostValue) -> Result<(), HostAccessError> {
        let wrong_shape = || HostAccessError::WrongShape { member: name.to_string() };
        let mut config = self.config.borrow_mut();
        match name {
            "name" => match value {
                HostValue::Str(s) => {
                    config.display_name = s;
                    Ok(())
                },
                _ => Err(wrong_shape()),
            },
            "dependency_graph" => match value {
                HostValue::Graph(g) => {
                    config.dependency_graph = g;
                    Ok(())
                },
                _ => Err(wrong_shape()),
            },
            "level_graph" => match value {
                HostValue::Graph(g) => {
                    config.level_graph = Some(g);
                    Ok(())
                },
                HostValue::None => {
                    config.level_graph = None;
                    Ok(())
                },
                _ => Err(wrong_shape()),
            },
            "quest_desc" => match value {
                HostValue::Str(s) => {
                    config.description = s;
                    Ok(())
                },
                _ => Err(wrong_shape()),
            },
            "quest_points" => match value {
                HostValue::Int(v) => {
                    config.points = v;
                    Ok(())
                },
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

/// Errors raised while interpreting one entry point.
#[derive(Debug, Clone, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("entry point '{name}' produced no config")]
    NoConfigProduced { name: String },
}

impl Interpreter {
    /// Interpret one entry point: the file is analyzed, its definitions are
    /// evaluated in declaration order (tasks and statements first, then
    /// graphs, then the entry's config block), and the resulting config is
    /// snapshotted.
    ///
    /// Each call runs in a fresh memory space under the shared global space,
    /// so interpreting the same entry point twice yields independent task
    /// and graph instances.
    ///
    /// # Errors
    /// Analysis or evaluation failures, or a config block that evaluates to
    /// something other than a `quest_config` host object.
    pub fn interpret_entry_point(&self, entry: &EntryPoint) -> Result<Config, InterpretError> {
        let analysis = analyze(self.environment(), &entry.file.program)?;

        let space = MemorySpace::child_of(self.global_space());
        for function in &analysis.functions {
            space.bind(function.name.clone(), Value::Func(Callable::Function(function.clone())));
        }

        self.push_space(space);
        let result = self.run_entry_point(entry);
        self.pop_space();
        result
    }

    fn run_entry_point(&self, entry: &EntryPoint) -> Result<Config, InterpretError> {
        let Node::Program(nodes) = &entry.file.program else {
            return Err(InterpretError::NoConfigProduced { name: entry.display_name.clone() });
        };

        // tasks and plain statements first, graphs over them, the config last
        for node in nodes {
            match node {
                Node::ObjectDef(def) if def.type_name != ENTRY_POINT_TYPE => {
                    self.eval(node)?;
                },
                Node::GraphDef(_) | Node::ObjectDef(_) | Node::FuncDef(_) => {},
                stmt => {
                    self.eval(stmt)?;
                },
            }
        }
        for node in nodes {
            if let Node::GraphDef(_) = node {
                self.eval(node)?;
            }
        }

        let value = self.eval_object_def(&entry.object)?;
        let no_config = || InterpretError::NoConfigProduced { name: entry.display_name.clone() };
        let Value::Aggregate(av) = value else { return Err(no_config()) };
        let object = av.space.host_object().ok_or_else(no_config)?;
        let binding = object.as_any().downcast_ref::<ConfigBinding>().ok_or_else(no_config)?;

        let mut config = binding.config();
        if config.display_name.is_empty() {
            config.display_name = entry.display_name.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(type_name: &str, name: &str, src_line: usize) -> Node {
        Node::ObjectDef(Rc::new(ObjectDef {
            type_name: type_name.into(),
            name: name.into(),
            properties: vec![],
            src_line,
        }))
    }

    #[test]
    fn entry_points_found_in_declaration_order() {
        let files = vec![
            ParsedFile::new(
                "a.dng",
                Node::Program(vec![
                    object("task", "t1", 1),
                    object(ENTRY_POINT_TYPE, "first", 5),
                ]),
            ),
            ParsedFile::new(
                "b.dng",
                Node::Program(vec![object(ENTRY_POINT_TYPE, "second", 1)]),
            ),
        ];
        let found = find_entry_points(&files);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].as_ref().map(|e| e.display_name.as_str()), Ok("first"));
        assert_eq!(found[1].as_ref().map(|e| e.display_name.as_str()), Ok("second"));
    }

    #[test]
    fn malformed_entry_point_does_not_hide_the_rest() {
        let files = vec![ParsedFile::new(
            "c.dng",
            Node::Program(vec![
                object(ENTRY_POINT_TYPE, "   ", 2),
                object(ENTRY_POINT_TYPE, "valid", 7),
            ]),
        )];
        let found = find_entry_points(&files);
        assert_eq!(found.len(), 2);
        assert!(matches!(
            found[0],
            Err(EntryPointError::MalformedEntryPoint { src_line: 2, .. })
        ));
        assert!(found[1].is_ok());
    }

    #[test]
    fn config_binding_rejects_wrong_shapes() {
        let binding = ConfigBinding::default();
        assert!(binding.set_member("quest_points", HostValue::Str("five".into())).is_err());
        binding.set_member("quest_points", HostValue::Int(5)).expect("set points");
        assert_eq!(binding.config().points, 5);
    }
}
