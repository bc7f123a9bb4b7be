// tests/runners.rs

use std::path::{Path, PathBuf};

use pipedag::errors::PipedagError;
use pipedag::exec::local::container_command;
use pipedag::exec::remote::{TesState, TesTask};
use pipedag::exec::{CommandLineTool, CommandRunner, LocalRunner, PoolError};
use pipedag_test_utils::with_timeout;
use tempfile::TempDir;

fn tool(argv: &[&str], base: &Path) -> CommandLineTool {
    CommandLineTool {
        command_line: argv.iter().map(|s| s.to_string()).collect(),
        base_dir: base.to_path_buf(),
        inputs: vec![],
        outputs: vec![],
        ncpus: 1,
        mem_mb: 0,
        image: None,
    }
}

#[test]
fn container_command_mounts_workdir_inputs_and_output_dirs() {
    let mut t = tool(&["sort", "in.txt"], Path::new("/work"));
    t.inputs = vec![PathBuf::from("/data/in.txt")];
    t.outputs = vec![
        PathBuf::from("/work/out/a.txt"),
        PathBuf::from("/work/out/b.txt"),
        PathBuf::from("/work/c.txt"),
    ];

    let argv = container_command(Path::new("/work"), &t, "alpine:3", Some("1000"));

    assert_eq!(
        argv,
        vec![
            "docker", "run", "--rm", "--user", "1000",
            "-v", "/work:/work", "-w", "/work",
            "-v", "/data/in.txt:/data/in.txt",
            "-v", "/work:/work",
            "-v", "/work/out:/work/out",
            "alpine:3", "sort", "in.txt",
        ]
    );
}

#[test]
fn container_command_without_user() {
    let t = tool(&["true"], Path::new("/w"));
    let argv = container_command(Path::new("/w"), &t, "img", None);
    assert!(!argv.iter().any(|a| a == "--user"));
    assert_eq!(argv.last().map(String::as_str), Some("true"));
}

#[test]
fn tes_task_serializes_single_executor() {
    let mut t = tool(&["bash", "-c", "wc -l in.txt > out.txt"], Path::new("/work"));
    t.ncpus = 2;
    t.mem_mb = 2048;
    t.inputs = vec![PathBuf::from("/work/in.txt")];
    t.outputs = vec![PathBuf::from("/work/out.txt")];

    let task = TesTask::from_tool(&t, "ubuntu").unwrap();
    let json = serde_json::to_value(&task).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "executors": [{
                "image": "ubuntu",
                "command": ["bash", "-c", "wc -l in.txt > out.txt"],
                "workdir": "/work",
            }],
            "resources": { "cpu_cores": 2, "ram_gb": 2.0 },
            "inputs": [{ "path": "/work/in.txt" }],
            "outputs": [{ "path": "/work/out.txt" }],
        })
    );
}

#[test]
fn tes_states_are_classified() {
    assert_eq!(TesState::classify("COMPLETE"), TesState::Complete);
    assert_eq!(TesState::classify("EXECUTOR_ERROR"), TesState::Failed);
    assert_eq!(TesState::classify("CANCELED"), TesState::Failed);
    assert_eq!(TesState::classify("RUNNING"), TesState::Running);
    assert_eq!(TesState::classify("QUEUED"), TesState::Running);
}

#[cfg(unix)]
#[tokio::test]
async fn local_runner_runs_in_workdir_and_releases_pools() {
    let dir = TempDir::new().unwrap();
    let runner = LocalRunner::new(2, 100);
    let t = tool(&["sh", "-c", "echo hi > made.txt"], dir.path());

    let log = with_timeout(runner.run_command(&t)).await.unwrap();

    assert_eq!(log.exit_code, Some(0));
    assert!(dir.path().join("made.txt").exists());
    assert_eq!(runner.pools().cpu.outstanding(), 0);
    assert_eq!(runner.pools().mem.outstanding(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn local_runner_reports_exit_code_and_releases_pools() {
    let dir = TempDir::new().unwrap();
    let runner = LocalRunner::new(1, 100);
    let t = tool(&["sh", "-c", "exit 3"], dir.path());

    match with_timeout(runner.run_command(&t)).await {
        Err(PipedagError::CommandFailed { code, .. }) => assert_eq!(code, 3),
        other => panic!("expected CommandFailed, got {other:?}"),
    }
    assert_eq!(runner.pools().cpu.in_use(), 0);
}

#[tokio::test]
async fn local_runner_rejects_requests_larger_than_the_machine() {
    let dir = TempDir::new().unwrap();
    let runner = LocalRunner::new(2, 100);
    let mut t = tool(&["true"], dir.path());
    t.ncpus = 3;

    match runner.run_command(&t).await {
        Err(PipedagError::Pool(PoolError::ExceedsCapacity { requested, .. })) => {
            assert_eq!(requested, 3)
        }
        other => panic!("expected ExceedsCapacity, got {other:?}"),
    }
}
