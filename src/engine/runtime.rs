// src/engine/runtime.rs

use std::fmt;
use std::time::Instant;

use tracing::{info, warn};

use crate::dag::{Dataflow, RunReport, Workflow};
use crate::errors::Result;
use crate::step::StepContext;
use crate::types::StepName;

use super::summary::SummaryEntry;

/// Drives one run of a workflow: assemble, trigger, drain, summarize.
pub struct Runtime {
    workflow: Workflow,
    ctx: StepContext,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("steps", &self.workflow.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(workflow: Workflow, ctx: StepContext) -> Self {
        Self { workflow, ctx }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Run every step once.
    ///
    /// Configuration problems found while assembling are returned as errors
    /// before anything executes; step failures end up in the outcome.
    pub async fn run(self, dry_run: bool) -> Result<RunOutcome> {
        let summary = self.ctx.summary.clone();
        let flow = Dataflow::assemble(&self.workflow, self.ctx)?;

        info!(steps = self.workflow.len(), dry_run, "workflow started");
        let started = Instant::now();
        let report = flow.run(dry_run).await;

        let unfinished: Vec<StepName> = self
            .workflow
            .steps()
            .map(|(name, _)| name)
            .filter(|name| report.status(name).is_none())
            .map(str::to_string)
            .collect();
        if !unfinished.is_empty() {
            warn!(steps = unfinished.len(), "some steps produced no status");
            for name in &unfinished {
                summary.no_status(name);
            }
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = report.failed().len(),
            "workflow finished"
        );

        summary.emit();
        Ok(RunOutcome {
            report,
            unfinished,
            summary: summary.entries(),
        })
    }
}

/// Everything a caller needs to decide how the run went.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    /// Steps that never reported, e.g. below a node that panicked.
    pub unfinished: Vec<StepName>,
    pub summary: Vec<SummaryEntry>,
}

impl RunOutcome {
    /// A run fails when some step reported `FAIL` and errors were recorded,
    /// or when some step never reported at all.
    pub fn is_failure(&self) -> bool {
        !self.unfinished.is_empty() || (self.report.has_failures() && !self.summary.is_empty())
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_failure() { 1 } else { 0 }
    }
}
