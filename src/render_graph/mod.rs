//! Render Graph System
//!
//! A declarative system for defining render passes as a directed acyclic graph (DAG).
//! Passes declare the resources they read and write; the compiler derives the
//! execution order, culls passes whose outputs are never observed and computes
//! resource lifetimes, and the executor runs the result against a backend.

pub mod compiler;
pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use compiler::*;
pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
