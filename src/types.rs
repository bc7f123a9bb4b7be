// src/types.rs

//! Value types shared by the graph builder, the steps and the runners.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// Canonical step name type used throughout the crate.
pub type StepName = String;

/// Name carried by the status that seeds a run.
pub const RUN_KEY: &str = "run";

/// Terminal status code of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    Ok,
    Fail,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "OK"),
            StatusCode::Fail => write!(f, "FAIL"),
        }
    }
}

/// Status value flowing along the edges of the dataflow graph.
///
/// A failing status is forwarded unchanged by every downstream step, so
/// `name` of a `FAIL` seen deep in the graph identifies the step where the
/// failure originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStatus {
    pub name: StepName,
    pub status: StatusCode,
    pub dry_run: bool,
}

impl WorkflowStatus {
    /// The status pushed into the source node to start a run.
    pub fn trigger(dry_run: bool) -> Self {
        Self {
            name: RUN_KEY.to_string(),
            status: StatusCode::Ok,
            dry_run,
        }
    }

    pub fn ok(name: impl Into<StepName>, dry_run: bool) -> Self {
        Self {
            name: name.into(),
            status: StatusCode::Ok,
            dry_run,
        }
    }

    pub fn fail(name: impl Into<StepName>, dry_run: bool) -> Self {
        Self {
            name: name.into(),
            status: StatusCode::Fail,
            dry_run,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Ok
    }

    pub fn is_fail(&self) -> bool {
        self.status == StatusCode::Fail
    }
}

/// Result of folding the upstream statuses a step receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// All upstream statuses were `OK`; `dry_run` is set if any of them was.
    Ready { dry_run: bool },
    /// An upstream step failed; this status must be forwarded unprocessed.
    Failed(WorkflowStatus),
}

impl Upstream {
    /// Apply the propagation rule: the first `FAIL` short-circuits, and the
    /// dry-run flag is sticky.
    pub fn fold(statuses: &[WorkflowStatus]) -> Self {
        let mut dry_run = false;
        for status in statuses {
            if status.is_fail() {
                return Upstream::Failed(status.clone());
            }
            dry_run |= status.dry_run;
        }
        Upstream::Ready { dry_run }
    }
}

/// A file referenced by a process description: a path relative to the
/// directory the description was declared in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataFile {
    pub base_dir: PathBuf,
    pub rel_path: PathBuf,
}

impl DataFile {
    pub fn new(base_dir: impl Into<PathBuf>, rel_path: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            rel_path: rel_path.into(),
        }
    }

    /// Absolute, lexically normalised path of this file.
    ///
    /// An already absolute `rel_path` is returned unchanged.
    pub fn abs(&self) -> PathBuf {
        if self.rel_path.is_absolute() {
            return self.rel_path.clone();
        }
        let joined = self.base_dir.join(&self.rel_path);
        let absolute = std::path::absolute(&joined).unwrap_or(joined);
        normalize_lexically(&absolute)
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abs().display())
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// How a process's command line is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTemplate {
    /// An argument vector template, split shell-style after rendering.
    CommandLine(String),
    /// A shell snippet, run as `bash -c <rendered>`.
    Shell(String),
}

impl CommandTemplate {
    pub fn source(&self) -> &str {
        match self {
            CommandTemplate::CommandLine(s) | CommandTemplate::Shell(s) => s,
        }
    }
}

/// A declared process, as handed over by the pipeline parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescription {
    pub name: StepName,
    pub base_path: PathBuf,
    pub command: CommandTemplate,
    /// Named input paths, relative to `base_path`.
    pub inputs: BTreeMap<String, String>,
    /// Named output paths, relative to `base_path`.
    pub outputs: BTreeMap<String, String>,
    pub mem_mb: u64,
    pub ncpus: u64,
    pub image: Option<String>,
}

impl ProcessDescription {
    pub fn input_files(&self) -> BTreeMap<String, DataFile> {
        self.inputs
            .iter()
            .map(|(k, v)| (k.clone(), DataFile::new(&self.base_path, v)))
            .collect()
    }

    pub fn output_files(&self) -> BTreeMap<String, DataFile> {
        self.outputs
            .iter()
            .map(|(k, v)| (k.clone(), DataFile::new(&self.base_path, v)))
            .collect()
    }
}
