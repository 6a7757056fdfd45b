#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

//! delve_script: the scripting layer of the Delve dungeon crawler.
//!
//! A front end hands programs over as [`ast::Node`] trees; this crate binds
//! and checks their symbols, builds the structural type view of registered
//! host types, interprets entry-point blocks into [`entrypoint::Config`]
//! values, and bridges host objects in and out of the interpreter without
//! copying their state.

pub mod ast;
pub mod entrypoint;
pub mod environment;
pub mod host;
pub mod runtime;
pub mod semantic;

pub use entrypoint::{Config, EntryPoint, EntryPointError, InterpretError, ParsedFile, find_entry_points};
pub use environment::{Environment, default_environment};
pub use runtime::RuntimeError;
pub use runtime::interpreter::Interpreter;
pub use runtime::value::{MemorySpace, MemorySpaceRef, Value};
pub use semantic::SemanticError;
pub use semantic::types::{Type, TypeError, TypeRef};
