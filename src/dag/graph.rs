// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{PipedagError, Result};
use crate::step::{FileCheckStep, ProcessStep, Step};
use crate::types::{DataFile, ProcessDescription, StepName};

/// Steps plus the dependency edges inferred from their file overlap.
///
/// Invariant: every name appearing in `dep_map` (as key or value) is a key
/// of `steps`, and no step depends on itself.
#[derive(Debug, Clone)]
pub struct Workflow {
    steps: BTreeMap<StepName, Arc<Step>>,
    dep_map: BTreeMap<StepName, Vec<StepName>>,
    /// Absolute input path -> steps consuming it. Informational only.
    consumers: BTreeMap<PathBuf, Vec<StepName>>,
}

impl Workflow {
    /// Build a workflow from process descriptions and explicit leaf files.
    pub fn from_descriptions(
        processes: impl IntoIterator<Item = ProcessDescription>,
        files: impl IntoIterator<Item = DataFile>,
    ) -> Result<Self> {
        let steps = processes
            .into_iter()
            .map(|d| Step::from(ProcessStep::new(d)))
            .chain(files.into_iter().map(|f| Step::from(FileCheckStep::new(f))))
            .collect();
        Self::build(steps)
    }

    /// Link every step to the producers of its inputs.
    ///
    /// Inputs nobody produces get a file check, shared by all consumers of
    /// the same absolute path: a declared one if there is one, otherwise a
    /// synthesized one. A declared file check on a produced path waits for
    /// its producer.
    pub fn build(steps: Vec<Step>) -> Result<Self> {
        let mut by_name: BTreeMap<StepName, Arc<Step>> = BTreeMap::new();
        for step in steps {
            let name = step.name().to_string();
            if by_name.insert(name.clone(), Arc::new(step)).is_some() {
                return Err(PipedagError::DuplicateStep(name));
            }
        }

        let mut producers: BTreeMap<PathBuf, StepName> = BTreeMap::new();
        let mut leaves: BTreeMap<PathBuf, StepName> = BTreeMap::new();
        let mut consumers: BTreeMap<PathBuf, Vec<StepName>> = BTreeMap::new();
        for (name, step) in &by_name {
            match step.as_ref() {
                Step::Process(_) => {
                    for file in step.outputs().values() {
                        let path = file.abs();
                        if let Some(first) = producers.get(&path) {
                            return Err(PipedagError::DuplicateOutput {
                                path,
                                first: first.clone(),
                                second: name.clone(),
                            });
                        }
                        producers.insert(path, name.clone());
                    }
                }
                Step::FileCheck(check) => {
                    leaves.insert(check.path(), name.clone());
                }
            }
            for file in step.inputs().values() {
                consumers.entry(file.abs()).or_default().push(name.clone());
            }
        }

        let mut synthesized: BTreeMap<StepName, Arc<Step>> = BTreeMap::new();
        let mut dep_map: BTreeMap<StepName, Vec<StepName>> = BTreeMap::new();
        for (name, step) in &by_name {
            let mut deps: BTreeSet<StepName> = BTreeSet::new();
            if let Step::FileCheck(check) = step.as_ref() {
                if let Some(producer) = producers.get(&check.path()) {
                    deps.insert(producer.clone());
                }
            }
            for file in step.inputs().values() {
                let path = file.abs();
                match producers.get(&path) {
                    Some(producer) if producer != name => {
                        deps.insert(producer.clone());
                    }
                    _ => match leaves.get(&path) {
                        Some(leaf) => {
                            deps.insert(leaf.clone());
                        }
                        None => {
                            let leaf = FileCheckStep::new(DataFile::new("", &path));
                            let leaf_name = leaf.name().to_string();
                            if !synthesized.contains_key(&leaf_name) {
                                debug!(path = %path.display(), consumer = %name, "synthesizing file check");
                                synthesized.insert(leaf_name.clone(), Arc::new(Step::from(leaf)));
                            }
                            deps.insert(leaf_name);
                        }
                    },
                }
            }
            dep_map.insert(name.clone(), deps.into_iter().collect());
        }

        for (name, step) in synthesized {
            if by_name.contains_key(&name) {
                return Err(PipedagError::DuplicateStep(name));
            }
            dep_map.insert(name.clone(), Vec::new());
            by_name.insert(name, step);
        }

        debug!(steps = by_name.len(), "workflow built");
        Ok(Self {
            steps: by_name,
            dep_map,
            consumers,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &Arc<Step>)> {
        self.steps.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn step(&self, name: &str) -> Option<&Arc<Step>> {
        self.steps.get(name)
    }

    /// Immediate dependencies of a step (producers of its inputs).
    pub fn dependencies_of(&self, name: &str) -> &[StepName] {
        self.dep_map.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a step.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.dep_map
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == name))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn dep_map(&self) -> &BTreeMap<StepName, Vec<StepName>> {
        &self.dep_map
    }

    /// Steps reading the given absolute path.
    pub fn consumers_of(&self, path: &std::path::Path) -> &[StepName] {
        self.consumers.get(path).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Dependency graph with edges pointing from producer to consumer.
    pub fn graph(&self) -> DiGraphMap<&str, ()> {
        let mut graph = DiGraphMap::new();
        for name in self.steps.keys() {
            graph.add_node(name.as_str());
        }
        for (name, deps) in &self.dep_map {
            for dep in deps {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
        graph
    }

    /// Names of the steps forming a dependency cycle, if there is one.
    pub fn find_cycle(&self) -> Option<Vec<StepName>> {
        tarjan_scc(&self.graph())
            .into_iter()
            .find(|scc| scc.len() > 1)
            .map(|mut scc| {
                scc.sort_unstable();
                scc.into_iter().map(str::to_string).collect()
            })
    }
}
