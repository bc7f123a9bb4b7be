// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! Process steps talk to a `CommandRunner` instead of spawning processes
//! themselves. This makes it easy to swap the local machine for a remote
//! execution service, and lets tests provide a runner that only records
//! what it was asked to do.
//!
//! - [`LocalRunner`](super::local::LocalRunner) runs commands as child
//!   processes (optionally inside a container), gated by the CPU and memory
//!   pools.
//! - [`RemoteRunner`](super::remote::RemoteRunner) submits each command as a
//!   task to a TES service and waits for it to finish.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;

/// A fully rendered command plus everything needed to place it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineTool {
    /// Argument vector; the first element is the program.
    pub command_line: Vec<String>,
    /// Working directory (may be relative to the current directory).
    pub base_dir: PathBuf,
    /// Absolute input paths.
    pub inputs: Vec<PathBuf>,
    /// Absolute output paths.
    pub outputs: Vec<PathBuf>,
    pub ncpus: u64,
    pub mem_mb: u64,
    /// Container image to run the command in, if any.
    pub image: Option<String>,
}

impl CommandLineTool {
    /// The command line joined for display.
    pub fn display_command(&self) -> String {
        self.command_line.join(" ")
    }
}

/// What a runner reports about a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLog {
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    /// Task ID assigned by a remote execution service.
    pub remote_id: Option<String>,
}

/// Trait abstracting how a single command is executed.
///
/// Implementations block (asynchronously) for the whole lifetime of the
/// command and return its error unchanged; there is no retry.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run_command<'a>(
        &'a self,
        tool: &'a CommandLineTool,
    ) -> Pin<Box<dyn Future<Output = Result<CommandLog>> + Send + 'a>>;
}
