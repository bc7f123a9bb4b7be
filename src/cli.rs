// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `pipedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipedag",
    version,
    about = "Run file-based pipelines as a resource-bounded DAG.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline manifest (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEDAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log line format.
    #[arg(long, global = true, value_enum, value_name = "FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// What to do; defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every step whose outputs are missing or out of date.
    Run(RunArgs),
    /// Print the dependency graph in Graphviz DOT format.
    Viz,
    /// List every declared input path.
    Inputs {
        /// Print one JSON object per input instead of bare paths.
        #[arg(long)]
        json: bool,
    },
    /// List every declared output path.
    Outputs {
        /// Print one JSON object per output instead of bare paths.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Decide what would run and log it, without running anything.
    #[arg(short = 'x', long)]
    pub dry_run: bool,

    /// Override the local CPU pool size.
    #[arg(long, value_name = "N")]
    pub cpus: Option<u64>,

    /// Override the local memory pool size in MB.
    #[arg(long, value_name = "MB")]
    pub mem_mb: Option<u64>,

    /// Submit commands to the TES service at this URL instead of running
    /// them locally.
    #[arg(long, value_name = "URL")]
    pub remote: Option<String>,

    /// Default container image for remote tasks.
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_manifest_in_current_dir() {
        let args = CliArgs::try_parse_from(["pipedag", "viz"]).unwrap();
        assert_eq!(args.config, default_config_path());
        assert!(matches!(args.command, Some(Command::Viz)));
    }

    #[test]
    fn inputs_subcommand_takes_json_flag() {
        let args = CliArgs::try_parse_from(["pipedag", "--config", "p/x.toml", "inputs", "--json"]).unwrap();
        assert_eq!(args.config, PathBuf::from("p/x.toml"));
        assert!(matches!(args.command, Some(Command::Inputs { json: true })));
    }
}
