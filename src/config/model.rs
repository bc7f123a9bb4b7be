// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{CommandTemplate, DataFile, ProcessDescription};

/// Pipeline manifest as read from a TOML file.
///
/// ```toml
/// [runner]
/// kind = "local"
/// cpus = 8
///
/// [process.gen]
/// cmd = "touch {{ outputs.a }}"
/// outputs = { a = "a.txt" }
///
/// [process.mid]
/// shell = "cat {{ inputs.a }} > {{ outputs.b }}"
/// inputs = { a = "a.txt" }
/// outputs = { b = "b.txt" }
///
/// [file.ref]
/// path = "data/ref.fa"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,

    /// All processes from `[process.<name>]`, keyed by step name.
    #[serde(default)]
    pub process: BTreeMap<String, ProcessConfig>,

    /// Explicit leaf files from `[file.<name>]`.
    #[serde(default)]
    pub file: BTreeMap<String, FileConfig>,

    /// Directory relative paths are resolved against. Set by the loader to
    /// the manifest's directory.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    #[default]
    Local,
    Remote,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    #[serde(default)]
    pub kind: RunnerKind,

    /// Local CPU pool capacity; defaults to the available parallelism.
    #[serde(default)]
    pub cpus: Option<u64>,

    /// Local memory pool capacity in MB.
    #[serde(default = "default_pool_mem_mb")]
    pub mem_mb: u64,

    /// TES service base URL (remote only).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Image for remote tasks whose process sets none.
    #[serde(default)]
    pub default_image: Option<String>,
}

fn default_pool_mem_mb() -> u64 {
    32000
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            kind: RunnerKind::default(),
            cpus: None,
            mem_mb: default_pool_mem_mb(),
            endpoint: None,
            default_image: None,
        }
    }
}

impl RunnerSection {
    pub fn effective_cpus(&self) -> u64 {
        self.cpus.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() as u64)
                .unwrap_or(1)
        })
    }
}

/// `[process.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// Command line template, split shell-style after rendering.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Shell template, run through `bash -c`.
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    #[serde(default = "default_ncpus")]
    pub ncpus: u64,

    #[serde(default)]
    pub mem_mb: u64,

    /// Container image to run the command in.
    #[serde(default)]
    pub image: Option<String>,

    /// Working directory, relative to the manifest directory.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

fn default_ncpus() -> u64 {
    1
}

/// `[file.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub path: String,
}

/// A process whose command form has been checked.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub command: CommandTemplate,
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub ncpus: u64,
    pub mem_mb: u64,
    pub image: Option<String>,
    pub workdir: Option<PathBuf>,
}

/// Validated manifest.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerSection,
    pub process: BTreeMap<String, ProcessSpec>,
    pub file: BTreeMap<String, FileConfig>,
    pub base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        runner: RunnerSection,
        process: BTreeMap<String, ProcessSpec>,
        file: BTreeMap<String, FileConfig>,
        base_dir: PathBuf,
    ) -> Self {
        Self {
            runner,
            process,
            file,
            base_dir,
        }
    }

    /// One description per `[process.<name>]`, rooted at the manifest
    /// directory (joined with `workdir` when set).
    pub fn process_descriptions(&self) -> Vec<ProcessDescription> {
        self.process
            .iter()
            .map(|(name, spec)| ProcessDescription {
                name: name.clone(),
                base_path: match &spec.workdir {
                    Some(dir) => self.base_dir.join(dir),
                    None => self.base_dir.clone(),
                },
                command: spec.command.clone(),
                inputs: spec.inputs.clone(),
                outputs: spec.outputs.clone(),
                mem_mb: spec.mem_mb,
                ncpus: spec.ncpus,
                image: spec.image.clone(),
            })
            .collect()
    }

    /// Explicit leaf files, relative to the manifest directory.
    pub fn file_declarations(&self) -> Vec<DataFile> {
        self.file
            .values()
            .map(|f| DataFile::new(&self.base_dir, &f.path))
            .collect()
    }
}
