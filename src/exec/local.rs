// src/exec/local.rs

//! Local-machine command runner.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::errors::{PipedagError, Result};
use crate::exec::backend::{CommandLineTool, CommandLog, CommandRunner};
use crate::exec::pool::ResourcePools;
use crate::types::normalize_lexically;

/// Runs commands as child processes on this machine.
///
/// Every command first passes admission control on the shared CPU and
/// memory pools; both allocations are held until the process exits and are
/// released before `run_command` returns, whatever the outcome.
#[derive(Debug)]
pub struct LocalRunner {
    pools: ResourcePools,
    /// Numeric user ID passed to `docker run --user`, resolved on first use.
    container_user: OnceCell<Option<String>>,
}

impl LocalRunner {
    pub fn new(cpus: u64, mem_mb: u64) -> Self {
        info!(cpus, mem_mb, "local runner configured");
        Self {
            pools: ResourcePools::new(cpus, mem_mb),
            container_user: OnceCell::new(),
        }
    }

    pub fn pools(&self) -> &ResourcePools {
        &self.pools
    }

    async fn run_local(&self, tool: &CommandLineTool) -> Result<CommandLog> {
        if tool.command_line.is_empty() {
            return Err(PipedagError::Template("empty command line".to_string()));
        }
        let workdir = normalize_lexically(&std::path::absolute(&tool.base_dir)?);

        info!(cpus = tool.ncpus, mem_mb = tool.mem_mb, "resource request");
        let admission = self.pools.admit(tool.ncpus, tool.mem_mb).await?;
        debug!(
            cpu_id = admission.cpu.id(),
            mem_id = admission.mem.id(),
            "resources granted"
        );

        let argv = match &tool.image {
            Some(image) => {
                let user = self.container_user().await;
                container_command(&workdir, tool, image, user.as_deref())
            }
            None => tool.command_line.clone(),
        };

        let result = spawn_and_wait(&argv, &workdir).await;
        drop(admission);
        result
    }

    async fn container_user(&self) -> Option<String> {
        self.container_user
            .get_or_init(|| async {
                let output = Command::new("id").arg("-u").output().await.ok()?;
                if !output.status.success() {
                    return None;
                }
                let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!uid.is_empty()).then_some(uid)
            })
            .await
            .clone()
    }
}

impl CommandRunner for LocalRunner {
    fn run_command<'a>(
        &'a self,
        tool: &'a CommandLineTool,
    ) -> Pin<Box<dyn Future<Output = Result<CommandLog>> + Send + 'a>> {
        Box::pin(self.run_local(tool))
    }
}

/// Build the `docker run` invocation for `tool`.
///
/// The working directory, every input path and every distinct parent
/// directory of an output path are bind-mounted at the same location inside
/// the container.
pub fn container_command(
    workdir: &Path,
    tool: &CommandLineTool,
    image: &str,
    user: Option<&str>,
) -> Vec<String> {
    let mut argv: Vec<String> = vec!["docker".into(), "run".into(), "--rm".into()];
    if let Some(uid) = user {
        argv.push("--user".into());
        argv.push(uid.to_string());
    }

    let workdir_str = workdir.display().to_string();
    argv.push("-v".into());
    argv.push(format!("{workdir_str}:{workdir_str}"));
    argv.push("-w".into());
    argv.push(workdir_str);

    for input in &tool.inputs {
        let p = normalize_lexically(&workdir.join(input));
        argv.push("-v".into());
        argv.push(format!("{0}:{0}", p.display()));
    }

    let output_dirs: BTreeSet<PathBuf> = tool
        .outputs
        .iter()
        .filter_map(|o| normalize_lexically(&workdir.join(o)).parent().map(Path::to_path_buf))
        .collect();
    for dir in output_dirs {
        argv.push("-v".into());
        argv.push(format!("{0}:{0}", dir.display()));
    }

    argv.push(image.to_string());
    argv.extend(tool.command_line.iter().cloned());
    argv
}

/// Spawn `argv` in `workdir` and wait for it, forwarding its output to the
/// log at debug level.
async fn spawn_and_wait(argv: &[String], workdir: &Path) -> Result<CommandLog> {
    let rendered = argv.join(" ");
    info!(command = %rendered, workdir = %workdir.display(), "executing");

    let started = Instant::now();
    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process '{}'", argv[0]))?;

    // Always consume both pipes so the child never blocks on a full buffer.
    if let Some(stdout) = child.stdout.take() {
        let program = argv[0].clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(program = %program, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let program = argv[0].clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(program = %program, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process '{}'", argv[0]))?;
    let code = status.code().unwrap_or(-1);

    if !status.success() {
        error!(command = %rendered, exit_code = code, "command exited with error");
        return Err(PipedagError::CommandFailed {
            command: rendered,
            code,
        });
    }

    info!(command = %rendered, exit_code = code, "command finished");
    Ok(CommandLog {
        exit_code: Some(code),
        elapsed: started.elapsed(),
        remote_id: None,
    })
}
