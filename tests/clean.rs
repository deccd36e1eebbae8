mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use builddag::exec::CancelToken;
use builddag::fs::FileSystem;
use builddag::types::FingerprintMode;
use builddag_test_utils::{init_tracing, ConfigFileBuilder, FakeRunner, TaskConfigBuilder};

use common::{engine, exists, pipeline_config, pipeline_runner, project_fs};

#[tokio::test]
async fn clean_removes_only_generated_outputs() {
    init_tracing();
    let fs = project_fs();
    let runner = Arc::new(pipeline_runner(&fs));
    let cfg = pipeline_config(FingerprintMode::Timestamp);
    let mut engine = engine(&cfg, &fs, &runner);
    engine.assemble(None, &CancelToken::never()).await.unwrap();

    let report = engine.clean().unwrap();

    assert_eq!(
        report.removed,
        vec![
            PathBuf::from("view/a_generated.tmpl"),
            PathBuf::from("view/b_generated.tmpl"),
        ]
    );
    assert!(report.already_missing.is_empty());
    assert!(!exists(&fs, "view/a_generated.tmpl"));
    assert!(!exists(&fs, "view/b_generated.tmpl"));

    // Sources and non-generated outputs survive.
    assert!(exists(&fs, "view/a.tmpl"));
    assert!(exists(&fs, "view/b.tmpl"));
    assert!(exists(&fs, "cmd/server/main.go"));
    assert!(exists(&fs, "build/app"));

    assert!(engine.state().artifacts.is_empty());
    assert!(engine.state().record("generate").is_none());
    assert!(engine.state().record("compile").is_some());
}

#[tokio::test]
async fn clean_is_idempotent() {
    let fs = project_fs();
    let runner = Arc::new(pipeline_runner(&fs));
    let cfg = pipeline_config(FingerprintMode::Timestamp);
    let mut engine = engine(&cfg, &fs, &runner);
    engine.assemble(None, &CancelToken::never()).await.unwrap();

    engine.clean().unwrap();
    let files_after_first = fs.files();

    let report = engine.clean().unwrap();

    assert!(report.removed.is_empty());
    assert!(report.already_missing.is_empty());
    assert_eq!(fs.files(), files_after_first);
}

#[tokio::test]
async fn clean_before_any_build_does_nothing() {
    let fs = project_fs();
    let runner = Arc::new(pipeline_runner(&fs));
    let cfg = pipeline_config(FingerprintMode::Timestamp);
    let mut engine = engine(&cfg, &fs, &runner);
    let before = fs.files();

    let report = engine.clean().unwrap();

    assert!(report.removed.is_empty());
    assert_eq!(fs.files(), before);
}

#[tokio::test]
async fn manually_deleted_output_is_reported_missing() {
    let fs = project_fs();
    let runner = Arc::new(pipeline_runner(&fs));
    let cfg = pipeline_config(FingerprintMode::Timestamp);
    let mut engine = engine(&cfg, &fs, &runner);
    engine.assemble(None, &CancelToken::never()).await.unwrap();

    fs.remove_file(Path::new("view/a_generated.tmpl")).unwrap();
    let report = engine.clean().unwrap();

    assert_eq!(report.removed, vec![PathBuf::from("view/b_generated.tmpl")]);
    assert_eq!(
        report.already_missing,
        vec![PathBuf::from("view/a_generated.tmpl")]
    );
}

#[tokio::test]
async fn rebuild_after_clean_regenerates_and_recompiles() {
    init_tracing();
    let fs = project_fs();
    let runner = Arc::new(pipeline_runner(&fs));
    let cfg = pipeline_config(FingerprintMode::Timestamp);
    let mut engine = engine(&cfg, &fs, &runner);
    engine.assemble(None, &CancelToken::never()).await.unwrap();

    let final_outputs = ["view/a_generated.tmpl", "view/b_generated.tmpl", "build/app"];
    let before: Vec<Option<Vec<u8>>> = final_outputs.iter().map(|p| fs.contents(p)).collect();

    engine.clean().unwrap();
    assert!(!exists(&fs, "view/a_generated.tmpl"));
    runner.clear();
    let report = engine.assemble(None, &CancelToken::never()).await.unwrap();

    assert!(report.was_executed("generate"));
    assert!(report.was_executed("compile"));
    let after: Vec<Option<Vec<u8>>> = final_outputs.iter().map(|p| fs.contents(p)).collect();
    assert!(before.iter().all(Option::is_some));
    assert_eq!(after, before);
    assert_eq!(engine.state().artifacts.len(), 2);
}

#[tokio::test]
async fn artifacts_of_unconfigured_tasks_are_left_alone() {
    let fs = project_fs();
    let runner = Arc::new(pipeline_runner(&fs));
    let cfg = pipeline_config(FingerprintMode::Timestamp);
    engine(&cfg, &fs, &runner)
        .assemble(None, &CancelToken::never())
        .await
        .unwrap();

    // Same project, but `generate` has been removed from the config.
    let reduced = ConfigFileBuilder::new()
        .with_task(
            "compile",
            TaskConfigBuilder::new(common::COMPILE_CMD)
                .input("**/*.go")
                .output("build/app")
                .build(),
        )
        .build();
    let runner = Arc::new(FakeRunner::new(fs.clone()));
    let mut reduced_engine = engine(&reduced, &fs, &runner);

    let report = reduced_engine.clean().unwrap();

    assert!(report.removed.is_empty());
    assert!(exists(&fs, "view/a_generated.tmpl"));
    assert_eq!(reduced_engine.state().artifacts.len(), 2);
    assert!(reduced_engine.state().record("generate").is_none());
}
