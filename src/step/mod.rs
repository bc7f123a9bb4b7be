// src/step/mod.rs

//! Units of schedulable work.
//!
//! A [`Step`] is either a [`ProcessStep`] (render a command, decide whether
//! to run it, run it) or a [`FileCheckStep`] (assert that an input file is on
//! disk). Both consume the statuses of their upstream steps and produce a
//! single [`WorkflowStatus`].
//!
//! - [`process`] holds the run/skip/fail state machine for commands.
//! - [`file_check`] holds the leaf existence check.
//! - [`template`] renders command templates into argument vectors.

pub mod file_check;
pub mod process;
pub mod template;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use file_check::FileCheckStep;
pub use process::{Freshness, ProcessStep};

use crate::engine::summary::RunSummary;
use crate::exec::CommandRunner;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{DataFile, WorkflowStatus};

/// Collaborators a step needs while processing.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub runner: Arc<dyn CommandRunner>,
    pub fs: Arc<dyn FileSystem>,
    pub summary: RunSummary,
}

impl StepContext {
    pub fn new(runner: Arc<dyn CommandRunner>, fs: Arc<dyn FileSystem>, summary: RunSummary) -> Self {
        Self { runner, fs, summary }
    }

    /// Context on the real filesystem with a fresh summary.
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(runner, Arc::new(RealFileSystem), RunSummary::new())
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Process(ProcessStep),
    FileCheck(FileCheckStep),
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Process(p) => p.name(),
            Step::FileCheck(f) => f.name(),
        }
    }

    /// True iff the step has no inputs and so hangs directly off the source.
    pub fn is_generator(&self) -> bool {
        match self {
            Step::Process(p) => p.desc().inputs.is_empty(),
            Step::FileCheck(_) => true,
        }
    }

    pub fn inputs(&self) -> BTreeMap<String, DataFile> {
        match self {
            Step::Process(p) => p.desc().input_files(),
            Step::FileCheck(_) => BTreeMap::new(),
        }
    }

    pub fn outputs(&self) -> BTreeMap<String, DataFile> {
        match self {
            Step::Process(p) => p.desc().output_files(),
            Step::FileCheck(f) => BTreeMap::from([("file".to_string(), f.file().clone())]),
        }
    }

    /// One-line human description, used in graph output.
    pub fn desc(&self) -> String {
        match self {
            Step::Process(p) => format!("run: {}", p.desc().command.source()),
            Step::FileCheck(f) => format!("check-file: {}", f.name()),
        }
    }

    /// Consume the upstream statuses and produce this step's status.
    ///
    /// `key` identifies the run the statuses belong to and is only used for
    /// logging.
    pub async fn process(&self, key: &str, upstream: &[WorkflowStatus], ctx: &StepContext) -> WorkflowStatus {
        match self {
            Step::Process(p) => p.process(key, upstream, ctx).await,
            Step::FileCheck(f) => f.process(key, upstream, ctx),
        }
    }
}

impl From<ProcessStep> for Step {
    fn from(step: ProcessStep) -> Self {
        Step::Process(step)
    }
}

impl From<FileCheckStep> for Step {
    fn from(step: FileCheckStep) -> Self {
        Step::FileCheck(step)
    }
}
