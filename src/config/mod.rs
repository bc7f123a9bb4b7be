// src/config/mod.rs

//! Pipeline manifest loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate it and fix the command form of each process (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, FileConfig, ProcessConfig, ProcessSpec, RawConfigFile, RunnerKind, RunnerSection};
pub use validate::validate_config;
