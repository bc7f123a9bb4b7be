// src/dag/mod.rs

//! Dependency graph and its executable dataflow form.
//!
//! - [`graph`] infers step dependencies from input/output path overlap.
//! - [`flow`] wires the graph into concurrent join nodes and runs it.
//! - [`viz`] renders the graph as Graphviz DOT.

pub mod flow;
pub mod graph;
pub mod viz;

pub use flow::{Dataflow, FlowHandle, RunReport};
pub use graph::Workflow;
