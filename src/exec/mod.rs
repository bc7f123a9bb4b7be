// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`pool`] implements admission control over CPU cores and memory.
//! - [`backend`] defines the `CommandRunner` trait that process steps call,
//!   and the `CommandLineTool` they hand to it.
//! - [`local`] runs commands as child processes (optionally in a container)
//!   after admission on the local pools.
//! - [`remote`] submits commands to a TES service.

pub mod backend;
pub mod local;
pub mod pool;
pub mod remote;

pub use backend::{CommandLineTool, CommandLog, CommandRunner};
pub use local::LocalRunner;
pub use pool::{ConstraintPool, PoolAllocation, PoolError, ResourcePools};
pub use remote::RemoteRunner;
