use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pipedag::errors::{PipedagError, Result};
use pipedag::exec::{CommandLineTool, CommandLog, CommandRunner};
use pipedag::fs::FileSystem;

/// What a [`RecordingRunner`] does when asked to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerBehaviour {
    /// Report success without touching any file.
    Succeed,
    /// Write every declared output, then report success.
    CreateOutputs,
    /// Report failure without touching any file.
    Fail,
    /// Write the first `n` declared outputs, then report failure.
    FailAfterCreating(usize),
}

/// A fake runner that:
/// - records every command it was asked to run, in order
/// - acts on the declared outputs through a `FileSystem`
/// - fails commands whose command line contains a configured marker
/// - panics on commands containing another marker
#[derive(Debug, Clone)]
pub struct RecordingRunner {
    fs: Arc<dyn FileSystem>,
    behaviour: RunnerBehaviour,
    fail_marker: Option<String>,
    panic_marker: Option<String>,
    delay: Option<Duration>,
    invocations: Arc<Mutex<Vec<CommandLineTool>>>,
}

impl RecordingRunner {
    pub fn new(fs: Arc<dyn FileSystem>, behaviour: RunnerBehaviour) -> Self {
        Self {
            fs,
            behaviour,
            fail_marker: None,
            panic_marker: None,
            delay: None,
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail (without writing anything) any command containing `marker`.
    pub fn fail_when(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Panic inside the runner on any command containing `marker`.
    pub fn panic_when(mut self, marker: &str) -> Self {
        self.panic_marker = Some(marker.to_string());
        self
    }

    /// Sleep this long before acting, to widen scheduling windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> Vec<CommandLineTool> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Display form of every recorded command, in invocation order.
    pub fn commands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(CommandLineTool::display_command)
            .collect()
    }

    async fn act(&self, tool: &CommandLineTool) -> Result<CommandLog> {
        self.invocations.lock().unwrap().push(tool.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(marker) = self.panic_marker.as_deref() {
            if tool.display_command().contains(marker) {
                panic!("runner panicked on `{}`", tool.display_command());
            }
        }

        let marked = self
            .fail_marker
            .as_deref()
            .is_some_and(|m| tool.display_command().contains(m));
        let behaviour = if marked { RunnerBehaviour::Fail } else { self.behaviour };

        let write_first = |n: usize| -> Result<()> {
            for path in tool.outputs.iter().take(n) {
                self.fs.write(path, b"output")?;
            }
            Ok(())
        };

        match behaviour {
            RunnerBehaviour::Succeed => Ok(CommandLog::default()),
            RunnerBehaviour::CreateOutputs => {
                write_first(tool.outputs.len())?;
                Ok(CommandLog {
                    exit_code: Some(0),
                    ..CommandLog::default()
                })
            }
            RunnerBehaviour::Fail => Err(PipedagError::CommandFailed {
                command: tool.display_command(),
                code: 1,
            }),
            RunnerBehaviour::FailAfterCreating(n) => {
                write_first(n)?;
                Err(PipedagError::CommandFailed {
                    command: tool.display_command(),
                    code: 1,
                })
            }
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn run_command<'a>(
        &'a self,
        tool: &'a CommandLineTool,
    ) -> Pin<Box<dyn Future<Output = Result<CommandLog>> + Send + 'a>> {
        Box::pin(self.act(tool))
    }
}
