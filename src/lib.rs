// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod step;
pub mod types;

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::loader::load_from_path;
use crate::config::model::{ConfigFile, RawConfigFile, RunnerKind};
use crate::dag::Workflow;
use crate::engine::{RunSummary, Runtime};
use crate::exec::{CommandRunner, LocalRunner, RemoteRunner};
use crate::fs::RealFileSystem;
use crate::step::StepContext;

/// High-level entry point used by `main.rs`; returns the process exit code.
///
/// This wires together:
/// - manifest loading (with CLI overrides applied before validation)
/// - dependency graph construction
/// - runner selection
/// - the single dataflow run and its summary
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.clone();
    let command = args.command.clone().unwrap_or(Command::Run(RunArgs::default()));

    let mut raw = load_from_path(&config_path)
        .with_context(|| format!("failed to load manifest {}", config_path.display()))?;
    if let Command::Run(run_args) = &command {
        apply_overrides(&mut raw, run_args);
    }
    let cfg = ConfigFile::try_from(raw)?;
    debug!(processes = cfg.process.len(), files = cfg.file.len(), "manifest loaded");

    match command {
        Command::Run(run_args) => run_pipeline(&cfg, run_args.dry_run).await,
        Command::Viz => {
            let workflow = build_workflow(&cfg)?;
            print!("{}", crate::dag::viz::to_dot(&workflow));
            Ok(0)
        }
        Command::Inputs { json } => {
            write_inputs(&cfg, json, &mut io::stdout().lock())?;
            Ok(0)
        }
        Command::Outputs { json } => {
            write_outputs(&cfg, json, &mut io::stdout().lock())?;
            Ok(0)
        }
    }
}

fn apply_overrides(raw: &mut RawConfigFile, args: &RunArgs) {
    if let Some(cpus) = args.cpus {
        raw.runner.cpus = Some(cpus);
    }
    if let Some(mem_mb) = args.mem_mb {
        raw.runner.mem_mb = mem_mb;
    }
    if let Some(endpoint) = &args.remote {
        raw.runner.kind = RunnerKind::Remote;
        raw.runner.endpoint = Some(endpoint.clone());
    }
    if let Some(image) = &args.image {
        raw.runner.default_image = Some(image.clone());
    }
}

fn build_workflow(cfg: &ConfigFile) -> Result<Workflow> {
    let workflow = Workflow::from_descriptions(cfg.process_descriptions(), cfg.file_declarations())?;
    Ok(workflow)
}

/// Pick the runner described by the manifest's `[runner]` section.
pub fn build_runner(cfg: &ConfigFile) -> Arc<dyn CommandRunner> {
    let runner = &cfg.runner;
    match runner.kind {
        RunnerKind::Local => Arc::new(LocalRunner::new(runner.effective_cpus(), runner.mem_mb)),
        RunnerKind::Remote => Arc::new(RemoteRunner::new(
            runner.endpoint.clone().unwrap_or_default(),
            runner.default_image.clone().unwrap_or_default(),
        )),
    }
}

async fn run_pipeline(cfg: &ConfigFile, dry_run: bool) -> Result<i32> {
    let workflow = build_workflow(cfg)?;
    info!(steps = workflow.len(), "workflow built");

    let ctx = StepContext::new(build_runner(cfg), Arc::new(RealFileSystem), RunSummary::new());
    let outcome = Runtime::new(workflow, ctx).run(dry_run).await?;

    let failed = outcome.report.failed();
    if !failed.is_empty() {
        info!(?failed, "steps failed");
    }
    Ok(outcome.exit_code())
}

#[derive(Debug, Serialize)]
struct InputEntry<'a> {
    step: &'a str,
    name: &'a str,
    path: PathBuf,
}

/// List declared inputs.
///
/// Plain output prints each distinct path once. JSON output prints one
/// object per declared input, so a path shared by several steps appears once
/// per consumer.
pub fn write_inputs(cfg: &ConfigFile, json: bool, out: &mut impl Write) -> Result<()> {
    let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
    for desc in &cfg.process_descriptions() {
        for (name, file) in desc.input_files() {
            let path = file.abs();
            if json {
                let entry = InputEntry {
                    step: &desc.name,
                    name: &name,
                    path,
                };
                writeln!(out, "{}", serde_json::to_string(&entry)?)?;
            } else if seen.insert(path.clone()) {
                writeln!(out, "{}", path.display())?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct OutputEntry<'a> {
    step: &'a str,
    name: &'a str,
    path: PathBuf,
    exists: bool,
}

/// List every declared output once, in step order.
pub fn write_outputs(cfg: &ConfigFile, json: bool, out: &mut impl Write) -> Result<()> {
    let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
    for desc in &cfg.process_descriptions() {
        for (name, file) in desc.output_files() {
            let path = file.abs();
            if !seen.insert(path.clone()) {
                continue;
            }
            if json {
                let exists = path.exists();
                let entry = OutputEntry {
                    step: &desc.name,
                    name: &name,
                    path,
                    exists,
                };
                writeln!(out, "{}", serde_json::to_string(&entry)?)?;
            } else {
                writeln!(out, "{}", path.display())?;
            }
        }
    }
    Ok(())
}
