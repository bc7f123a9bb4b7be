// src/dag/viz.rs

//! Graphviz export of a built workflow.

use std::collections::BTreeMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::graph::Workflow;
use crate::step::Step;

fn label(name: &str, step: &Step) -> String {
    match step {
        Step::Process(_) => format!("{name}: {}", step.desc()),
        Step::FileCheck(_) => step.desc(),
    }
}

/// Render `workflow` as a DOT digraph, one node per step and one edge per
/// dependency, pointing from producer to consumer.
pub fn to_dot(workflow: &Workflow) -> String {
    let mut graph: DiGraph<String, &str> = DiGraph::new();
    let mut index: BTreeMap<&str, NodeIndex> = BTreeMap::new();

    for (name, step) in workflow.steps() {
        index.insert(name, graph.add_node(label(name, step)));
    }
    for (name, _) in workflow.steps() {
        for dep in workflow.dependencies_of(name) {
            if let (Some(&from), Some(&to)) = (index.get(dep.as_str()), index.get(name)) {
                graph.add_edge(from, to, "");
            }
        }
    }

    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}
