// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::pool::PoolError;

#[derive(Error, Debug)]
pub enum PipedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("non-unique workflow step name: {0}")]
    DuplicateStep(String),

    #[error("output {path:?} is declared by both '{first}' and '{second}'")]
    DuplicateOutput {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("steps could not be attached to the dataflow graph: {}", .0.join(", "))]
    UnattachedSteps(Vec<String>),

    #[error("Cycle detected in workflow: {0}")]
    DagCycle(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("command {command:?} exited with code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("remote execution error: {0}")]
    Remote(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for PipedagError {
    fn from(err: reqwest::Error) -> Self {
        PipedagError::Remote(err.to_string())
    }
}

impl PipedagError {
    /// Whether this error belongs to the configuration class, i.e. it was
    /// detected before any step could run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipedagError::ConfigError(_)
                | PipedagError::TomlError(_)
                | PipedagError::DuplicateStep(_)
                | PipedagError::DuplicateOutput { .. }
                | PipedagError::UnattachedSteps(_)
                | PipedagError::DagCycle(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipedagError>;
