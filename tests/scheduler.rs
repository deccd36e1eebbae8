use std::path::Path;
use std::sync::Arc;

use builddag::context::BuildContext;
use builddag::dag::{Scheduler, TaskGraph};
use builddag::errors::{BuildError, TaskRunError};
use builddag::exec::CancelToken;
use builddag::fs::mock::MockFileSystem;
use builddag::fs::FileSystem;
use builddag::state::{BuildState, MemoryStateStore};
use builddag::task::{ActionContext, Locator, Task, TaskAction, TaskFn};
use builddag_test_utils::{init_tracing, FakeRunner};

fn locator(pattern: &str) -> Locator {
    Locator::new(pattern).unwrap()
}

fn context(fs: &MockFileSystem, runner: FakeRunner) -> BuildContext {
    BuildContext::new(".", Arc::new(fs.clone()), Arc::new(runner))
}

/// Writes every input, upper-cased, to `out/<name>.upper`.
fn upper_case_action() -> TaskFn {
    Arc::new(|args: &ActionContext<'_>| -> anyhow::Result<()> {
        let fs = args.ctx.fs();
        for input in args.inputs {
            let text = fs.read_to_string(&args.ctx.root().join(input))?;
            let name = input.file_stem().unwrap_or_default().to_string_lossy();
            fs.write(
                &args.ctx.root().join(format!("out/{name}.upper")),
                text.to_uppercase().as_bytes(),
            )?;
        }
        Ok(())
    })
}

#[tokio::test]
async fn function_action_writes_outputs_and_is_then_fresh() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");
    fs.add_file("src/b.txt", "beta");
    let ctx = context(&fs, FakeRunner::new(fs.clone()));

    let graph = TaskGraph::new(vec![Task::new(
        "upper",
        TaskAction::Function(upper_case_action()),
    )
    .input(locator("src/*.txt"))
    .output(locator("out/*.upper"))])
    .unwrap();
    let store = MemoryStateStore::new();
    let mut state = BuildState::default();

    let report = Scheduler::new(&graph, &ctx, &mut state, &store)
        .execute("upper", &CancelToken::never())
        .await
        .unwrap();
    assert_eq!(report.executed_names(), vec!["upper"]);
    assert_eq!(fs.contents("out/a.upper").unwrap(), b"ALPHA".to_vec());
    assert_eq!(fs.contents("out/b.upper").unwrap(), b"BETA".to_vec());
    assert_eq!(state.record("upper").unwrap().outputs.len(), 2);

    let report = Scheduler::new(&graph, &ctx, &mut state, &store)
        .execute("upper", &CancelToken::never())
        .await
        .unwrap();
    assert!(report.is_up_to_date());
}

#[tokio::test]
async fn failing_function_action_names_the_task() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");
    let ctx = context(&fs, FakeRunner::new(fs.clone()));

    let fail: TaskFn = Arc::new(|_: &ActionContext<'_>| -> anyhow::Result<()> {
        anyhow::bail!("schema mismatch in src/a.txt")
    });
    let graph = TaskGraph::new(vec![Task::new("check", TaskAction::Function(fail))
        .input(locator("src/*.txt"))
        .output(locator("out/check.ok"))])
    .unwrap();
    let store = MemoryStateStore::new();
    let mut state = BuildState::default();

    let err = Scheduler::new(&graph, &ctx, &mut state, &store)
        .execute("check", &CancelToken::never())
        .await
        .unwrap_err();

    match err {
        BuildError::TaskRun(TaskRunError::Action { task, message }) => {
            assert_eq!(task, "check");
            assert!(message.contains("schema mismatch"), "{message}");
        }
        other => panic!("expected action error, got {other:?}"),
    }
    assert!(state.record("check").is_none());
}

#[tokio::test]
async fn plain_task_writing_a_generated_file_is_a_conflict() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("proto/api.proto", "service Api {}");
    let runner = FakeRunner::new(fs.clone())
        .writes("protoc", &["gen/api.pb.go"])
        .writes("stub", &["gen/api.pb.go", "gen/stub.pb.go"]);
    let ctx = context(&fs, runner);

    let graph = TaskGraph::new(vec![
        Task::new("protoc", TaskAction::Command("protoc api.proto".into()))
            .input(locator("proto/*.proto"))
            .output(locator("gen/api.pb.go"))
            .generated(true),
        Task::new("stubs", TaskAction::Command("stub gen".into()))
            .output(locator("gen/*.pb.go"))
            .after("protoc"),
    ])
    .unwrap();
    let store = MemoryStateStore::new();
    let mut state = BuildState::default();

    let err = Scheduler::new(&graph, &ctx, &mut state, &store)
        .execute("stubs", &CancelToken::never())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            BuildError::OutputConflict { ref task, ref owner, ref path }
                if task == "stubs" && owner == "protoc" && path == Path::new("gen/api.pb.go")
        ),
        "{err}"
    );
    assert!(state.record("protoc").is_some());
    assert!(state.record("stubs").is_none());
}

#[tokio::test]
async fn glob_covering_an_up_to_date_tasks_output_is_a_conflict() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/main.c", "int main;");
    let runner = FakeRunner::new(fs.clone()).writes("cc", &["out/app.bin"]);
    let ctx = context(&fs, runner);

    let compile = Task::new("compile", TaskAction::Command("cc src/main.c".into()))
        .input(locator("src/*.c"))
        .output(locator("out/app.bin"));
    let store = MemoryStateStore::new();
    let mut state = BuildState::default();

    let first = TaskGraph::new(vec![compile.clone()]).unwrap();
    Scheduler::new(&first, &ctx, &mut state, &store)
        .execute("compile", &CancelToken::never())
        .await
        .unwrap();

    // A second task whose glob covers the compiler's output.
    let second = TaskGraph::new(vec![
        compile,
        Task::new("package", TaskAction::Noop)
            .output(locator("out/*.bin"))
            .after("compile"),
    ])
    .unwrap();
    let err = Scheduler::new(&second, &ctx, &mut state, &store)
        .execute("package", &CancelToken::never())
        .await
        .unwrap_err();

    assert!(
        matches!(err, BuildError::OutputConflict { ref task, ref owner, .. }
            if task == "package" && owner == "compile"),
        "{err}"
    );
}
