// src/exec/remote.rs

//! Remote command runner speaking the GA4GH Task Execution Service API.
//!
//! No local pool is consulted: the service owns admission control. Each
//! command becomes one single-executor task; the runner polls the task until
//! it reaches a terminal state.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::errors::{PipedagError, Result};
use crate::exec::backend::{CommandLineTool, CommandLog, CommandRunner};
use crate::types::normalize_lexically;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TesTask {
    pub executors: Vec<TesExecutor>,
    pub resources: TesResources,
    pub inputs: Vec<TesPath>,
    pub outputs: Vec<TesPath>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TesExecutor {
    pub image: String,
    pub command: Vec<String>,
    pub workdir: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TesResources {
    pub cpu_cores: u64,
    pub ram_gb: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TesPath {
    pub path: String,
}

impl TesTask {
    /// Describe `tool` as a TES task running in `image`.
    pub fn from_tool(tool: &CommandLineTool, image: &str) -> Result<Self> {
        let workdir = normalize_lexically(&std::path::absolute(&tool.base_dir)?);
        Ok(Self {
            executors: vec![TesExecutor {
                image: image.to_string(),
                command: tool.command_line.clone(),
                workdir: workdir.display().to_string(),
            }],
            resources: TesResources {
                cpu_cores: tool.ncpus,
                ram_gb: tool.mem_mb as f64 / 1024.0,
            },
            inputs: tool
                .inputs
                .iter()
                .map(|p| TesPath { path: p.display().to_string() })
                .collect(),
            outputs: tool
                .outputs
                .iter()
                .map(|p| TesPath { path: p.display().to_string() })
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskView {
    #[serde(default)]
    state: Option<String>,
}

/// Outcome classes of a TES task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TesState {
    Running,
    Complete,
    Failed,
}

impl TesState {
    pub fn classify(state: &str) -> Self {
        match state {
            "COMPLETE" => TesState::Complete,
            "EXECUTOR_ERROR" | "SYSTEM_ERROR" | "CANCELED" | "PREEMPTED" => TesState::Failed,
            _ => TesState::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteRunner {
    client: reqwest::Client,
    endpoint: String,
    default_image: String,
    poll_interval: Duration,
}

impl RemoteRunner {
    pub fn new(endpoint: impl Into<String>, default_image: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let default_image = default_image.into();
        info!(endpoint = %endpoint, default_image = %default_image, "remote runner configured");
        Self {
            client: reqwest::Client::new(),
            endpoint,
            default_image,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn run_remote(&self, tool: &CommandLineTool) -> Result<CommandLog> {
        let image = tool.image.as_deref().unwrap_or(&self.default_image);
        let task = TesTask::from_tool(tool, image)?;
        let started = Instant::now();

        info!(
            endpoint = %self.endpoint,
            image = %image,
            command = %tool.display_command(),
            "submitting remote task"
        );
        let created: CreateTaskResponse = self
            .client
            .post(format!("{}/v1/tasks", self.endpoint))
            .json(&task)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let id = created.id;
        debug!(task_id = %id, "remote task created");

        loop {
            let view: TaskView = self
                .client
                .get(format!("{}/v1/tasks/{}?view=MINIMAL", self.endpoint, id))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let state = view.state.unwrap_or_else(|| "UNKNOWN".to_string());
            match TesState::classify(&state) {
                TesState::Complete => {
                    info!(task_id = %id, "remote task complete");
                    return Ok(CommandLog {
                        exit_code: None,
                        elapsed: started.elapsed(),
                        remote_id: Some(id),
                    });
                }
                TesState::Failed => {
                    error!(task_id = %id, state = %state, "remote task failed");
                    return Err(PipedagError::Remote(format!(
                        "task {id} finished in state {state}"
                    )));
                }
                TesState::Running => {
                    debug!(task_id = %id, state = %state, "remote task still running");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

impl CommandRunner for RemoteRunner {
    fn run_command<'a>(
        &'a self,
        tool: &'a CommandLineTool,
    ) -> Pin<Box<dyn Future<Output = Result<CommandLog>> + Send + 'a>> {
        Box::pin(self.run_remote(tool))
    }
}
