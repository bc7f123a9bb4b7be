// src/engine/mod.rs

//! Whole-run orchestration.
//!
//! - [`runtime`] assembles the dataflow for a workflow, runs it once and
//!   hands back the per-step statuses.
//! - [`summary`] collects the missing-file and failure events reported at
//!   the end of the run.

pub mod runtime;
pub mod summary;

pub use runtime::{RunOutcome, Runtime};
pub use summary::{RunSummary, SummaryEntry, SummaryKind};
