// src/dag/flow.rs

//! Dataflow assembly and execution.
//!
//! A [`Workflow`] is turned into a push network of concurrent nodes:
//!
//! - one source node fed by a control channel carrying the run trigger;
//! - one node per step, holding a receiver for every dependency and a
//!   sender for every dependent.
//!
//! Nodes are attached in repeated passes: a step is attached once all of its
//! dependencies are. A pass that attaches nothing ends assembly; anything
//! left over is reported as a configuration error.
//!
//! Each node waits for a value from **every** predecessor before calling
//! [`Step::process`], then sends its status to all dependents. If a
//! predecessor goes away without sending, the node emits nothing either.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::graph::Workflow;
use crate::errors::{PipedagError, Result};
use crate::step::{Step, StepContext};
use crate::types::{RUN_KEY, StepName, WorkflowStatus};

struct Node {
    step: Arc<Step>,
    upstream: Vec<oneshot::Receiver<WorkflowStatus>>,
    downstream: Vec<oneshot::Sender<WorkflowStatus>>,
}

/// An assembled, not yet running, dataflow graph.
pub struct Dataflow {
    key: String,
    source: Vec<oneshot::Sender<WorkflowStatus>>,
    nodes: Vec<Node>,
    ctx: StepContext,
}

impl std::fmt::Debug for Dataflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataflow")
            .field("key", &self.key)
            .field("generators", &self.source.len())
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl Dataflow {
    /// Wire every step of `workflow` into the network.
    pub fn assemble(workflow: &Workflow, ctx: StepContext) -> Result<Self> {
        let mut source = Vec::new();
        let mut nodes: Vec<Node> = Vec::with_capacity(workflow.len());
        let mut attached: BTreeMap<&str, usize> = BTreeMap::new();

        for (name, step) in workflow.steps() {
            if step.is_generator() && workflow.dependencies_of(name).is_empty() {
                let (tx, rx) = oneshot::channel();
                source.push(tx);
                attached.insert(name, nodes.len());
                nodes.push(Node {
                    step: Arc::clone(step),
                    upstream: vec![rx],
                    downstream: Vec::new(),
                });
            }
        }
        debug!(generators = source.len(), "generators attached to source");

        let mut pass = 0usize;
        loop {
            pass += 1;
            let mut newly = 0usize;
            for (name, step) in workflow.steps() {
                if attached.contains_key(name) {
                    continue;
                }
                let deps = workflow.dependencies_of(name);
                let ready: Vec<usize> = deps
                    .iter()
                    .filter_map(|d| attached.get(d.as_str()).copied())
                    .collect();
                if ready.len() != deps.len() {
                    continue;
                }

                let mut upstream = Vec::with_capacity(ready.len());
                for idx in ready {
                    let (tx, rx) = oneshot::channel();
                    nodes[idx].downstream.push(tx);
                    upstream.push(rx);
                }
                attached.insert(name, nodes.len());
                nodes.push(Node {
                    step: Arc::clone(step),
                    upstream,
                    downstream: Vec::new(),
                });
                newly += 1;
            }
            debug!(pass, attached = newly, "attachment pass finished");
            if newly == 0 {
                break;
            }
        }

        if attached.len() != workflow.len() {
            if let Some(cycle) = workflow.find_cycle() {
                return Err(PipedagError::DagCycle(cycle.join(" -> ")));
            }
            let unattached = workflow
                .steps()
                .map(|(name, _)| name)
                .filter(|name| !attached.contains_key(name))
                .map(str::to_string)
                .collect();
            return Err(PipedagError::UnattachedSteps(unattached));
        }

        Ok(Self {
            key: RUN_KEY.to_string(),
            source,
            nodes,
            ctx,
        })
    }

    /// Spawn every node and return a handle for triggering the run.
    pub fn start(self) -> FlowHandle {
        let (control_tx, mut control_rx) = mpsc::channel::<WorkflowStatus>(1);
        let mut tasks: JoinSet<Option<(StepName, WorkflowStatus)>> = JoinSet::new();

        let generators = self.source;
        tasks.spawn(async move {
            // One logical run: only the first trigger is fanned out.
            if let Some(trigger) = control_rx.recv().await {
                info!(run = %trigger.name, dry_run = trigger.dry_run, "run triggered");
                for tx in generators {
                    let _ = tx.send(trigger.clone());
                }
                while control_rx.recv().await.is_some() {
                    warn!("ignoring additional trigger for a finished source");
                }
            } else {
                debug!("control channel closed without a trigger");
            }
            None
        });

        for node in self.nodes {
            let ctx = self.ctx.clone();
            let key = self.key.clone();
            tasks.spawn(run_node(node, key, ctx));
        }

        FlowHandle { control: control_tx, tasks }
    }

    /// Trigger a single run with the given dry-run flag and wait for it to
    /// drain.
    pub async fn run(self, dry_run: bool) -> RunReport {
        let mut handle = self.start();
        handle.trigger(WorkflowStatus::trigger(dry_run)).await;
        handle.finish().await
    }
}

async fn run_node(node: Node, key: String, ctx: StepContext) -> Option<(StepName, WorkflowStatus)> {
    let name = node.step.name().to_string();
    let mut statuses = Vec::with_capacity(node.upstream.len());
    for rx in node.upstream {
        match rx.await {
            Ok(status) => statuses.push(status),
            Err(_) => {
                debug!(step = %name, "upstream closed without a status");
                return None;
            }
        }
    }

    let status = node.step.process(&key, &statuses, &ctx).await;
    debug!(step = %name, status = %status.status, from = %status.name, "step done");
    for tx in node.downstream {
        let _ = tx.send(status.clone());
    }
    Some((name, status))
}

/// Handle on a started dataflow.
#[derive(Debug)]
pub struct FlowHandle {
    control: mpsc::Sender<WorkflowStatus>,
    tasks: JoinSet<Option<(StepName, WorkflowStatus)>>,
}

impl FlowHandle {
    /// Push the initial status into the source.
    pub async fn trigger(&mut self, status: WorkflowStatus) {
        if self.control.send(status).await.is_err() {
            warn!("source already finished; trigger dropped");
        }
    }

    /// Close the control channel and wait for every node to finish.
    pub async fn finish(self) -> RunReport {
        let FlowHandle { control, mut tasks } = self;
        drop(control);

        let mut statuses = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((name, status))) => {
                    statuses.insert(name, status);
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, "dataflow node panicked"),
            }
        }
        RunReport { statuses }
    }
}

/// Terminal status of every step that produced one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub statuses: BTreeMap<StepName, WorkflowStatus>,
}

impl RunReport {
    pub fn status(&self, step: &str) -> Option<&WorkflowStatus> {
        self.statuses.get(step)
    }

    /// Steps whose terminal status is `FAIL`, by name.
    pub fn failed(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| s.is_fail())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.statuses.values().any(WorkflowStatus::is_fail)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
