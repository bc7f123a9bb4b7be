// src/step/process.rs

//! Run/skip/fail state machine of a process step.

use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{debug, error, info, warn};

use crate::exec::CommandLineTool;
use crate::fs::FileSystem;
use crate::step::StepContext;
use crate::step::template::render_command;
use crate::types::{ProcessDescription, StepName, Upstream, WorkflowStatus};

/// State of a step's declared outputs relative to its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Every output exists and none is older than the newest input.
    Fresh,
    /// At least one declared output is absent.
    Missing(PathBuf),
    /// All outputs exist but the newest one predates the newest input.
    Stale,
}

#[derive(Debug, Clone)]
pub struct ProcessStep {
    desc: ProcessDescription,
}

impl ProcessStep {
    pub fn new(desc: ProcessDescription) -> Self {
        Self { desc }
    }

    pub fn name(&self) -> &StepName {
        &self.desc.name
    }

    pub fn desc(&self) -> &ProcessDescription {
        &self.desc
    }

    fn input_paths(&self) -> Vec<PathBuf> {
        self.desc.input_files().values().map(|f| f.abs()).collect()
    }

    fn output_paths(&self) -> Vec<PathBuf> {
        self.desc.output_files().values().map(|f| f.abs()).collect()
    }

    /// Compare the declared outputs against the declared inputs on `fs`.
    pub fn freshness(&self, fs: &dyn FileSystem) -> Freshness {
        let outputs = self.output_paths();
        if outputs.is_empty() {
            return Freshness::Fresh;
        }
        if let Some(missing) = outputs.iter().find(|p| !fs.exists(p)) {
            return Freshness::Missing(missing.clone());
        }

        let newest_input = newest_mtime(fs, &self.input_paths());
        let newest_output = newest_mtime(fs, &outputs);
        match (newest_output, newest_input) {
            (_, None) => Freshness::Fresh,
            (Some(out), Some(inp)) if out >= inp => Freshness::Fresh,
            _ => Freshness::Stale,
        }
    }

    pub async fn process(&self, key: &str, upstream: &[WorkflowStatus], ctx: &StepContext) -> WorkflowStatus {
        let name = self.name().as_str();
        let dry_run = match Upstream::fold(upstream) {
            Upstream::Failed(status) => {
                debug!(step = %name, failed = %status.name, "upstream failed, not running");
                return status;
            }
            Upstream::Ready { dry_run } => dry_run,
        };

        let argv = match render_command(&self.desc.command, &self.desc.inputs, &self.desc.outputs) {
            Ok(argv) => argv,
            Err(e) => {
                error!(step = %name, error = %e, "failed to render command");
                ctx.summary.template_error(name, e.to_string());
                return WorkflowStatus::fail(name, dry_run);
            }
        };

        match self.freshness(ctx.fs.as_ref()) {
            Freshness::Fresh => {
                info!(step = %name, reason = "outputs fresh", "skipping");
                return WorkflowStatus::ok(name, dry_run);
            }
            Freshness::Missing(path) => {
                debug!(step = %name, path = %path.display(), "output missing")
            }
            Freshness::Stale => debug!(step = %name, "outputs older than inputs"),
        }

        let tool = CommandLineTool {
            command_line: argv,
            base_dir: self.desc.base_path.clone(),
            inputs: self.input_paths(),
            outputs: self.output_paths(),
            ncpus: self.desc.ncpus,
            mem_mb: self.desc.mem_mb,
            image: self.desc.image.clone(),
        };

        if dry_run {
            info!(step = %name, command = %tool.display_command(), "dry run, would run");
            return WorkflowStatus::ok(name, dry_run);
        }

        info!(step = %name, run = %key, command = %tool.display_command(), "starting");
        match ctx.runner.run_command(&tool).await {
            Ok(log) => {
                debug!(step = %name, elapsed_ms = log.elapsed.as_millis() as u64, "command finished");
                let mut status = WorkflowStatus::ok(name, dry_run);
                for output in &tool.outputs {
                    if !ctx.fs.exists(output) {
                        error!(step = %name, path = %output.display(), "declared output missing after run");
                        ctx.summary.missing_output(name, output);
                        status = WorkflowStatus::fail(name, dry_run);
                    }
                }
                if status.is_ok() {
                    info!(step = %name, "finished");
                }
                status
            }
            Err(e) => {
                error!(step = %name, error = %e, "command failed");
                ctx.summary.command_failed(name, e.to_string());
                remove_partial_outputs(name, ctx.fs.as_ref(), &tool.outputs);
                WorkflowStatus::fail(name, dry_run)
            }
        }
    }
}

fn newest_mtime(fs: &dyn FileSystem, paths: &[PathBuf]) -> Option<SystemTime> {
    paths.iter().filter_map(|p| fs.modified(p)).max()
}

/// Best-effort removal of outputs a failed command left behind.
fn remove_partial_outputs(step: &str, fs: &dyn FileSystem, outputs: &[PathBuf]) {
    for path in outputs.iter().filter(|p| fs.is_file(p)) {
        match fs.remove_file(path) {
            Ok(()) => info!(step = %step, path = %path.display(), "removed partial output"),
            Err(e) => warn!(step = %step, path = %path.display(), error = %e, "could not remove partial output"),
        }
    }
}
