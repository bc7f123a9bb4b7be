// src/step/file_check.rs

use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::step::StepContext;
use crate::types::{DataFile, StepName, Upstream, WorkflowStatus};

/// Zero-cost leaf step asserting that a file exists.
///
/// Its name is the absolute path of the file, which makes it unique per
/// path by construction.
#[derive(Debug, Clone)]
pub struct FileCheckStep {
    file: DataFile,
    name: StepName,
}

impl FileCheckStep {
    pub fn new(file: DataFile) -> Self {
        let name = file.abs().display().to_string();
        Self { file, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &DataFile {
        &self.file
    }

    pub fn path(&self) -> PathBuf {
        self.file.abs()
    }

    pub fn process(&self, key: &str, upstream: &[WorkflowStatus], ctx: &StepContext) -> WorkflowStatus {
        let dry_run = match Upstream::fold(upstream) {
            Upstream::Failed(status) => return status,
            Upstream::Ready { dry_run } => dry_run,
        };

        let path = self.path();
        debug!(run = %key, path = %path.display(), "checking for file");
        if ctx.fs.exists(&path) {
            info!(path = %path.display(), "file present");
            WorkflowStatus::ok(&self.name, dry_run)
        } else {
            error!(path = %path.display(), "missing file");
            ctx.summary.missing_file(&self.name, &path);
            WorkflowStatus::fail(&self.name, dry_run)
        }
    }
}
