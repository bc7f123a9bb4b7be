// tests/process_step.rs

use std::path::Path;
use std::sync::Arc;

use pipedag::engine::{RunSummary, SummaryKind};
use pipedag::fs::FileSystem;
use pipedag::fs::mock::MockFileSystem;
use pipedag::step::{FileCheckStep, Freshness, ProcessStep, Step, StepContext};
use pipedag::types::{DataFile, StatusCode, WorkflowStatus};
use pipedag_test_utils::{init_tracing, ProcessBuilder, RecordingRunner, RunnerBehaviour};

fn setup(behaviour: RunnerBehaviour) -> (Arc<MockFileSystem>, Arc<RecordingRunner>, StepContext) {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    let runner = Arc::new(RecordingRunner::new(fs.clone(), behaviour));
    let ctx = StepContext::new(runner.clone(), fs.clone(), RunSummary::new());
    (fs, runner, ctx)
}

fn sort_step() -> Step {
    ProcessBuilder::new("sort")
        .cmd("sort {{ inputs.raw }} -o {{ outputs.sorted }}")
        .input("raw", "raw.txt")
        .output("sorted", "sorted.txt")
        .step()
}

#[tokio::test]
async fn upstream_failure_short_circuits_without_running() {
    let (_fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);
    let upstream = vec![
        WorkflowStatus::ok("other", false),
        WorkflowStatus::fail("gen", true),
    ];

    let status = sort_step().process("run", &upstream, &ctx).await;

    assert_eq!(status, WorkflowStatus::fail("gen", true));
    assert_eq!(runner.count(), 0);
    assert!(!ctx.summary.has_errors());
}

#[tokio::test]
async fn fresh_outputs_are_skipped() {
    let (fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);
    fs.add_file("/work/raw.txt", "b\na\n");
    fs.add_file("/work/sorted.txt", "a\nb\n");

    let status = sort_step().process("run", &[WorkflowStatus::trigger(false)], &ctx).await;

    assert_eq!(status.status, StatusCode::Ok);
    assert_eq!(status.name, "sort");
    assert_eq!(runner.count(), 0);
}

#[tokio::test]
async fn missing_output_runs_exactly_once() {
    let (fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);
    fs.add_file("/work/raw.txt", "b\na\n");

    let status = sort_step().process("run", &[WorkflowStatus::trigger(false)], &ctx).await;

    assert!(status.is_ok());
    assert_eq!(runner.count(), 1);
    assert_eq!(runner.commands(), vec!["sort raw.txt -o sorted.txt".to_string()]);

    let tool = &runner.invocations()[0];
    assert_eq!(tool.base_dir, Path::new("/work"));
    assert_eq!(tool.inputs, vec![Path::new("/work/raw.txt").to_path_buf()]);
    assert_eq!(tool.outputs, vec![Path::new("/work/sorted.txt").to_path_buf()]);
    assert!(fs.exists(Path::new("/work/sorted.txt")));
}

#[tokio::test]
async fn stale_outputs_are_rebuilt() {
    let (fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);
    fs.add_file("/work/sorted.txt", "old");
    fs.add_file("/work/raw.txt", "newer input");

    let Step::Process(process) = sort_step() else { unreachable!() };
    assert_eq!(process.freshness(fs.as_ref()), Freshness::Stale);

    let status = process.process("run", &[WorkflowStatus::trigger(false)], &ctx).await;
    assert!(status.is_ok());
    assert_eq!(runner.count(), 1);
}

#[tokio::test]
async fn dry_run_reports_ok_without_running() {
    let (fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);
    fs.add_file("/work/raw.txt", "b\na\n");

    let status = sort_step().process("run", &[WorkflowStatus::trigger(true)], &ctx).await;

    assert_eq!(status, WorkflowStatus::ok("sort", true));
    assert_eq!(runner.count(), 0);
    assert!(!fs.exists(Path::new("/work/sorted.txt")));
}

#[tokio::test]
async fn template_error_fails_without_side_effects() {
    let (_fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);
    let step = ProcessBuilder::new("broken")
        .cmd("cat {{ inputs.nope }}")
        .output("o", "o.txt")
        .step();

    let status = step.process("run", &[WorkflowStatus::trigger(false)], &ctx).await;

    assert_eq!(status, WorkflowStatus::fail("broken", false));
    assert_eq!(runner.count(), 0);
    assert_eq!(ctx.summary.count(SummaryKind::TemplateError), 1);
}

#[tokio::test]
async fn failed_command_removes_partial_outputs() {
    let (fs, runner, ctx) = setup(RunnerBehaviour::FailAfterCreating(1));
    let step = ProcessBuilder::new("split")
        .shell("split {{ outputs.a }} {{ outputs.b }}")
        .output("a", "a.txt")
        .output("b", "b.txt")
        .step();

    let status = step.process("run", &[WorkflowStatus::trigger(false)], &ctx).await;

    assert_eq!(status, WorkflowStatus::fail("split", false));
    assert_eq!(runner.count(), 1);
    assert_eq!(
        runner.invocations()[0].command_line,
        vec!["bash", "-c", "split a.txt b.txt"]
    );
    assert!(!fs.exists(Path::new("/work/a.txt")));
    assert!(!fs.exists(Path::new("/work/b.txt")));
    assert_eq!(ctx.summary.count(SummaryKind::CommandFailed), 1);
}

#[tokio::test]
async fn cleanup_leaves_directories_alone() {
    let (fs, _runner, ctx) = setup(RunnerBehaviour::Fail);
    fs.add_dir("/work/outdir");
    let step = ProcessBuilder::new("dir").output("d", "outdir").output("f", "f.txt").step();

    let status = step.process("run", &[WorkflowStatus::trigger(false)], &ctx).await;

    assert!(status.is_fail());
    assert!(fs.exists(Path::new("/work/outdir")));
}

#[tokio::test]
async fn success_with_missing_output_is_a_failure() {
    let (_fs, runner, ctx) = setup(RunnerBehaviour::Succeed);

    let status = ProcessBuilder::new("liar")
        .output("o", "o.txt")
        .step()
        .process("run", &[WorkflowStatus::trigger(false)], &ctx)
        .await;

    assert!(status.is_fail());
    assert_eq!(runner.count(), 1);
    let entries = ctx.summary.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, SummaryKind::MissingOutput);
    assert_eq!(entries[0].path.as_deref(), Some(Path::new("/work/o.txt")));
}

#[tokio::test]
async fn step_without_outputs_is_always_skipped() {
    let (_fs, runner, ctx) = setup(RunnerBehaviour::CreateOutputs);

    let status = ProcessBuilder::new("noop")
        .cmd("echo hi")
        .step()
        .process("run", &[WorkflowStatus::trigger(false)], &ctx)
        .await;

    assert!(status.is_ok());
    assert_eq!(runner.count(), 0);
}

#[tokio::test]
async fn file_check_reports_presence() {
    let (fs, _runner, ctx) = setup(RunnerBehaviour::Succeed);
    fs.add_file("/data/present.txt", "x");

    let present = Step::from(FileCheckStep::new(DataFile::new("/data", "present.txt")));
    let absent = Step::from(FileCheckStep::new(DataFile::new("/data", "absent.txt")));

    let trigger = [WorkflowStatus::trigger(false)];
    assert!(present.process("run", &trigger, &ctx).await.is_ok());

    let status = absent.process("run", &trigger, &ctx).await;
    assert_eq!(status, WorkflowStatus::fail("/data/absent.txt", false));
    assert_eq!(ctx.summary.count(SummaryKind::MissingFile), 1);
}

#[test]
fn process_step_exposes_declared_files() {
    let step = Step::from(ProcessStep::new(
        ProcessBuilder::new("p")
            .input("i", "in.txt")
            .output("o", "out/o.txt")
            .build(),
    ));
    assert!(!step.is_generator());
    assert_eq!(step.inputs()["i"].abs(), Path::new("/work/in.txt"));
    assert_eq!(step.outputs()["o"].abs(), Path::new("/work/out/o.txt"));
    assert_eq!(step.desc(), "run: true");
}
