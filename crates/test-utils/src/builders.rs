#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use pipedag::step::{ProcessStep, Step};
use pipedag::types::{CommandTemplate, ProcessDescription};

/// Builder for `ProcessDescription` to simplify test setup.
///
/// Defaults: base path `/work`, command `true`, one CPU, no memory, no
/// image.
pub struct ProcessBuilder {
    desc: ProcessDescription,
}

impl ProcessBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            desc: ProcessDescription {
                name: name.to_string(),
                base_path: PathBuf::from("/work"),
                command: CommandTemplate::CommandLine("true".to_string()),
                inputs: BTreeMap::new(),
                outputs: BTreeMap::new(),
                mem_mb: 0,
                ncpus: 1,
                image: None,
            },
        }
    }

    pub fn base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.desc.base_path = dir.into();
        self
    }

    pub fn cmd(mut self, template: &str) -> Self {
        self.desc.command = CommandTemplate::CommandLine(template.to_string());
        self
    }

    pub fn shell(mut self, template: &str) -> Self {
        self.desc.command = CommandTemplate::Shell(template.to_string());
        self
    }

    pub fn input(mut self, name: &str, path: &str) -> Self {
        self.desc.inputs.insert(name.to_string(), path.to_string());
        self
    }

    pub fn output(mut self, name: &str, path: &str) -> Self {
        self.desc.outputs.insert(name.to_string(), path.to_string());
        self
    }

    pub fn cpus(mut self, n: u64) -> Self {
        self.desc.ncpus = n;
        self
    }

    pub fn mem_mb(mut self, mb: u64) -> Self {
        self.desc.mem_mb = mb;
        self
    }

    pub fn image(mut self, image: &str) -> Self {
        self.desc.image = Some(image.to_string());
        self
    }

    pub fn build(self) -> ProcessDescription {
        self.desc
    }

    pub fn step(self) -> Step {
        Step::from(ProcessStep::new(self.desc))
    }
}
