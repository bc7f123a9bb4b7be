// tests/config_loading.rs

use std::io::Write;
use std::path::Path;

use pipedag::config::{load_and_validate, RunnerKind};
use pipedag::dag::Workflow;
use pipedag::errors::PipedagError;
use pipedag::types::CommandTemplate;
use tempfile::{NamedTempFile, TempDir};

fn write_manifest(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("Pipedag.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn manifest_becomes_process_descriptions() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(
        &dir,
        r#"
[runner]
cpus = 4

[process.gen]
cmd = "touch {{ outputs.a }}"
outputs = { a = "a.txt" }

[process.mid]
shell = "cat {{ inputs.a }} > {{ outputs.b }}"
inputs = { a = "a.txt" }
outputs = { b = "b.txt" }
ncpus = 2
mem_mb = 512
image = "alpine:3"
workdir = "sub"

[file.ref]
path = "data/ref.fa"
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.runner.kind, RunnerKind::Local);
    assert_eq!(cfg.runner.effective_cpus(), 4);
    assert_eq!(cfg.runner.mem_mb, 32000);

    let descs = cfg.process_descriptions();
    assert_eq!(descs.len(), 2);
    let gen_desc = &descs[0];
    assert_eq!(gen_desc.name, "gen");
    assert_eq!(gen_desc.base_path, dir.path());
    assert_eq!(gen_desc.ncpus, 1);
    assert_eq!(gen_desc.mem_mb, 0);
    assert!(matches!(gen_desc.command, CommandTemplate::CommandLine(_)));

    let mid = &descs[1];
    assert_eq!(mid.base_path, dir.path().join("sub"));
    assert_eq!((mid.ncpus, mid.mem_mb), (2, 512));
    assert_eq!(mid.image.as_deref(), Some("alpine:3"));
    assert!(matches!(mid.command, CommandTemplate::Shell(_)));

    let files = cfg.file_declarations();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].abs(), dir.path().join("data/ref.fa"));

    // mid runs in sub/, so its a.txt is not gen's a.txt.
    let wf = Workflow::from_descriptions(descs, files).unwrap();
    assert_eq!(
        wf.dependencies_of("mid"),
        [dir.path().join("sub/a.txt").display().to_string()]
    );
}

#[test]
fn remote_runner_requires_endpoint() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(
        &dir,
        r#"
[runner]
kind = "remote"
default_image = "ubuntu"

[process.gen]
cmd = "true"
"#,
    );

    match load_and_validate(&path) {
        Err(PipedagError::ConfigError(msg)) => assert!(msg.contains("endpoint")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn process_needs_exactly_one_command_form() {
    let mut both = NamedTempFile::new().unwrap();
    write!(
        both,
        r#"
[process.p]
cmd = "echo a"
shell = "echo b"
"#
    )
    .unwrap();
    let err = load_and_validate(both.path()).unwrap_err();
    assert!(err.to_string().contains("both"));

    let mut neither = NamedTempFile::new().unwrap();
    write!(
        neither,
        r#"
[process.p]
outputs = {{ o = "o.txt" }}
"#
    )
    .unwrap();
    let err = load_and_validate(neither.path()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn empty_manifest_is_rejected() {
    let file = NamedTempFile::new().unwrap();
    match load_and_validate(file.path()) {
        Err(PipedagError::ConfigError(msg)) => assert!(msg.contains("at least one")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_runner_kind_is_a_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[runner]
kind = "cluster"

[process.p]
cmd = "true"
"#
    )
    .unwrap();
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipedagError::TomlError(_))
    ));
}

#[test]
fn empty_paths_are_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[process.p]
cmd = "true"
outputs = {{ o = " " }}
"#
    )
    .unwrap();
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(err.to_string().contains("empty output path"));
}

#[test]
fn missing_manifest_is_an_io_error() {
    let err = load_and_validate(Path::new("/nonexistent/Pipedag.toml")).unwrap_err();
    assert!(matches!(err, PipedagError::IoError(_)));
}
