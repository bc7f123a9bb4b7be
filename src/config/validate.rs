// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, ProcessConfig, ProcessSpec, RawConfigFile, RunnerKind};
use crate::errors::{PipedagError, Result};
use crate::types::CommandTemplate;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        let process = raw
            .process
            .into_iter()
            .map(|(name, p)| {
                let command = command_template(&name, &p)?;
                Ok((
                    name,
                    ProcessSpec {
                        command,
                        inputs: p.inputs,
                        outputs: p.outputs,
                        ncpus: p.ncpus,
                        mem_mb: p.mem_mb,
                        image: p.image,
                        workdir: p.workdir,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(ConfigFile::new_unchecked(raw.runner, process, raw.file, raw.base_dir))
    }
}

/// Check a raw manifest without converting it.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_runner(cfg)?;
    for (name, process) in &cfg.process {
        command_template(name, process)?;
        validate_paths(name, process)?;
    }
    for (name, file) in &cfg.file {
        if file.path.trim().is_empty() {
            return Err(PipedagError::ConfigError(format!(
                "file '{name}' has an empty `path`"
            )));
        }
    }
    Ok(())
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.process.is_empty() && cfg.file.is_empty() {
        return Err(PipedagError::ConfigError(
            "manifest must contain at least one [process.<name>] or [file.<name>] section"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    let runner = &cfg.runner;
    match runner.kind {
        RunnerKind::Local => {
            if runner.cpus == Some(0) {
                return Err(PipedagError::ConfigError(
                    "[runner].cpus must be >= 1 (got 0)".to_string(),
                ));
            }
        }
        RunnerKind::Remote => {
            if runner.endpoint.as_deref().is_none_or(|e| e.trim().is_empty()) {
                return Err(PipedagError::ConfigError(
                    "[runner].endpoint is required when kind = \"remote\"".to_string(),
                ));
            }
            if runner.default_image.as_deref().is_none_or(|i| i.trim().is_empty()) {
                return Err(PipedagError::ConfigError(
                    "[runner].default_image is required when kind = \"remote\"".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn command_template(name: &str, process: &ProcessConfig) -> Result<CommandTemplate> {
    let template = match (&process.cmd, &process.shell) {
        (Some(cmd), None) => CommandTemplate::CommandLine(cmd.clone()),
        (None, Some(shell)) => CommandTemplate::Shell(shell.clone()),
        (Some(_), Some(_)) => {
            return Err(PipedagError::ConfigError(format!(
                "process '{name}' sets both `cmd` and `shell`"
            )));
        }
        (None, None) => {
            return Err(PipedagError::ConfigError(format!(
                "process '{name}' needs one of `cmd` or `shell`"
            )));
        }
    };
    if template.source().trim().is_empty() {
        return Err(PipedagError::ConfigError(format!(
            "process '{name}' has an empty command"
        )));
    }
    Ok(template)
}

fn validate_paths(name: &str, process: &ProcessConfig) -> Result<()> {
    let declared = process
        .inputs
        .iter()
        .map(|e| ("input", e))
        .chain(process.outputs.iter().map(|e| ("output", e)));
    for (direction, (key, path)) in declared {
        if path.trim().is_empty() {
            return Err(PipedagError::ConfigError(format!(
                "process '{name}' has an empty {direction} path for '{key}'"
            )));
        }
    }
    Ok(())
}
