#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

//! Shared data model for the Delve quest scripting subsystem.
//!
//! Holds the task lifecycle model, the task dependency graph authored through
//! the scripting layer, and the Petri nets an external game runtime drives to
//! sequence tasks.

pub mod compiler;
pub mod graph;
pub mod petri;
pub mod task;

pub use compiler::compile;
pub use graph::{EdgeKind, GraphError, TaskDependencyGraph, TaskEdge};
pub use petri::{PetriNet, Place, PlaceRef, Transition, TransitionRef};
pub use task::{Task, TaskHandle, TaskState};
