use std::path::{Path, PathBuf};
use std::sync::Arc;

use builddag::context::BuildContext;
use builddag::fs::mock::MockFileSystem;
use builddag::fs::FileSystem;
use builddag::stale::{ContentHashStrategy, StaleReason, StalenessEvaluator, Verdict};
use builddag::state::RunRecord;
use builddag::task::{Locator, Task, TaskAction};
use builddag_test_utils::FakeRunner;

fn context(fs: &MockFileSystem) -> BuildContext {
    BuildContext::new(
        ".",
        Arc::new(fs.clone()),
        Arc::new(FakeRunner::new(fs.clone())),
    )
}

fn generate_task() -> Task {
    Task::new("generate", TaskAction::Command("templ generate".to_string()))
        .input(Locator::new("view/**/*.tmpl").unwrap())
        .output(Locator::new("view/**/*_generated.tmpl").unwrap())
}

/// What the scheduler stores after a successful run.
fn record_now(ctx: &BuildContext, task: &Task) -> RunRecord {
    let snapshot = StalenessEvaluator::new(ctx).snapshot(task, &[]).unwrap();
    RunRecord::from_snapshot(snapshot, 0)
}

fn verdict(ctx: &BuildContext, task: &Task, record: Option<&RunRecord>) -> Verdict {
    task.is_stale(ctx, record, &[]).unwrap()
}

#[test]
fn never_run_task_is_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("view/a_generated.tmpl", "a");
    let ctx = context(&fs);

    assert_eq!(
        verdict(&ctx, &generate_task(), None),
        Verdict::Stale(StaleReason::NeverRun)
    );
}

#[test]
fn missing_outputs_win_over_everything_else() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    let ctx = context(&fs);

    assert_eq!(
        verdict(&ctx, &generate_task(), None),
        Verdict::Stale(StaleReason::MissingOutputs {
            locator: "view/**/*_generated.tmpl".to_string()
        })
    );
}

#[test]
fn unchanged_inputs_and_outputs_are_fresh() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("view/a_generated.tmpl", "a");
    let ctx = context(&fs);
    let task = generate_task();

    let record = record_now(&ctx, &task);
    assert_eq!(verdict(&ctx, &task, Some(&record)), Verdict::Fresh);
}

#[test]
fn own_outputs_are_not_inputs() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("view/a_generated.tmpl", "a");
    let ctx = context(&fs);

    let snapshot = StalenessEvaluator::new(&ctx)
        .snapshot(&generate_task(), &[])
        .unwrap();
    let inputs: Vec<&PathBuf> = snapshot.inputs.keys().collect();
    assert_eq!(inputs, vec![&PathBuf::from("view/a.tmpl")]);
}

#[test]
fn modified_input_makes_task_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("view/a_generated.tmpl", "a");
    let ctx = context(&fs);
    let task = generate_task();
    let record = record_now(&ctx, &task);

    fs.add_file("view/a.tmpl", "a2");

    assert_eq!(
        verdict(&ctx, &task, Some(&record)),
        Verdict::Stale(StaleReason::InputChanged {
            path: PathBuf::from("view/a.tmpl")
        })
    );
}

#[test]
fn added_and_removed_inputs_make_task_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("view/a_generated.tmpl", "a");
    let ctx = context(&fs);
    let task = generate_task();
    let record = record_now(&ctx, &task);

    fs.add_file("view/b.tmpl", "b");
    assert_eq!(
        verdict(&ctx, &task, Some(&record)),
        Verdict::Stale(StaleReason::InputSetChanged {
            path: PathBuf::from("view/b.tmpl")
        })
    );

    fs.remove_file(Path::new("view/b.tmpl")).unwrap();
    fs.remove_file(Path::new("view/a.tmpl")).unwrap();
    assert_eq!(
        verdict(&ctx, &task, Some(&record)),
        Verdict::Stale(StaleReason::InputSetChanged {
            path: PathBuf::from("view/a.tmpl")
        })
    );
}

#[test]
fn removed_recorded_output_makes_task_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("view/b.tmpl", "b");
    fs.add_file("view/a_generated.tmpl", "a");
    fs.add_file("view/b_generated.tmpl", "b");
    let ctx = context(&fs);
    let task = generate_task();
    let record = record_now(&ctx, &task);

    fs.remove_file(Path::new("view/b_generated.tmpl")).unwrap();

    assert_eq!(
        verdict(&ctx, &task, Some(&record)),
        Verdict::Stale(StaleReason::OutputRemoved {
            path: PathBuf::from("view/b_generated.tmpl")
        })
    );
}

#[test]
fn output_older_than_input_is_stale() {
    let fs = MockFileSystem::new();
    // Output written first, so it is older than the input.
    fs.add_file("view/a_generated.tmpl", "old");
    fs.add_file("view/a.tmpl", "a");
    let ctx = context(&fs);
    let task = generate_task();
    let record = record_now(&ctx, &task);

    assert_eq!(
        verdict(&ctx, &task, Some(&record)),
        Verdict::Stale(StaleReason::OutputOlderThanInput {
            output: PathBuf::from("view/a_generated.tmpl"),
            input: PathBuf::from("view/a.tmpl"),
        })
    );
}

#[test]
fn content_mode_ignores_timestamps() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a_generated.tmpl", "old");
    fs.add_file("view/a.tmpl", "a");
    let ctx = context(&fs).with_fingerprints(Arc::new(ContentHashStrategy::new()));
    let task = generate_task();
    let record = record_now(&ctx, &task);

    assert_eq!(verdict(&ctx, &task, Some(&record)), Verdict::Fresh);

    fs.touch("view/a.tmpl");
    assert_eq!(verdict(&ctx, &task, Some(&record)), Verdict::Fresh);

    fs.add_file("view/a.tmpl", "changed");
    assert!(verdict(&ctx, &task, Some(&record)).is_stale());
}

#[test]
fn task_without_inputs_only_reruns_for_missing_outputs() {
    let fs = MockFileSystem::new();
    fs.add_file("build/app", "binary");
    let ctx = context(&fs);
    let task = Task::new("fetch", TaskAction::Command("fetch-tool".to_string()))
        .output(Locator::new("build/app").unwrap());

    assert_eq!(
        verdict(&ctx, &task, None),
        Verdict::Stale(StaleReason::NeverRun)
    );

    let record = record_now(&ctx, &task);
    fs.touch("build/app");
    fs.add_file("unrelated.txt", "x");
    assert_eq!(verdict(&ctx, &task, Some(&record)), Verdict::Fresh);

    fs.remove_file(Path::new("build/app")).unwrap();
    assert!(matches!(
        verdict(&ctx, &task, Some(&record)),
        Verdict::Stale(StaleReason::MissingOutputs { .. })
    ));
}

#[test]
fn upstream_outputs_are_implicit_inputs() {
    let fs = MockFileSystem::new();
    fs.add_file("main.go", "package main");
    fs.add_file("view/a_generated.tmpl", "a");
    fs.add_file("build/app", "binary");
    let ctx = context(&fs);
    let compile = Task::new("compile", TaskAction::Command("go build".to_string()))
        .input(Locator::new("**/*.go").unwrap())
        .output(Locator::new("build/app").unwrap());
    let upstream = vec![PathBuf::from("view/a_generated.tmpl")];

    let snapshot = StalenessEvaluator::new(&ctx)
        .snapshot(&compile, &upstream)
        .unwrap();
    let record = RunRecord::from_snapshot(snapshot, 0);
    assert_eq!(
        compile.is_stale(&ctx, Some(&record), &upstream).unwrap(),
        Verdict::Fresh
    );

    fs.add_file("view/a_generated.tmpl", "regenerated");
    assert_eq!(
        compile.is_stale(&ctx, Some(&record), &upstream).unwrap(),
        Verdict::Stale(StaleReason::InputChanged {
            path: PathBuf::from("view/a_generated.tmpl")
        })
    );
}

#[test]
fn unreadable_directory_is_a_check_error_not_a_verdict() {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "a");
    fs.add_file("out/a_generated.tmpl", "a");
    fs.set_unreadable("view");
    let ctx = context(&fs);
    let task = Task::new("generate", TaskAction::Noop)
        .input(Locator::new("view/*.tmpl").unwrap())
        .output(Locator::new("out/*.tmpl").unwrap());

    let err = task.is_stale(&ctx, None, &[]).unwrap_err();
    assert_eq!(err.task, "generate");
    assert_eq!(err.locator, "view/*.tmpl");
}
