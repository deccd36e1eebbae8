#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use builddag::config::ConfigFile;
use builddag::engine::Engine;
use builddag::fs::mock::MockFileSystem;
use builddag::types::FingerprintMode;
use builddag_test_utils::{ConfigFileBuilder, FakeRunner, TaskConfigBuilder};

pub const GENERATE_CMD: &str = "templ generate -f {input} -o {output}";
pub const COMPILE_CMD: &str = "go build -o build/app ./cmd/server";

/// A small generate-then-compile project:
///
/// ```text
/// view/a.tmpl  view/b.tmpl  cmd/server/main.go  docs/index.md
/// ```
pub fn project_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("view/a.tmpl", "<p>a</p>");
    fs.add_file("view/b.tmpl", "<p>b</p>");
    fs.add_file("cmd/server/main.go", "package main");
    fs.add_file("docs/index.md", "# docs");
    fs
}

/// `generate` (per file) -> `compile` -> `assemble`, plus an unrelated
/// `docs` task.
pub fn pipeline_config(mode: FingerprintMode) -> ConfigFile {
    ConfigFileBuilder::new()
        .fingerprint(mode)
        .workers(2)
        .with_task(
            "generate",
            TaskConfigBuilder::new(GENERATE_CMD)
                .input("view/**/*.tmpl")
                .output("view/**/*_generated.tmpl")
                .generated(true)
                .per_file(None)
                .build(),
        )
        .with_task(
            "compile",
            TaskConfigBuilder::new(COMPILE_CMD)
                .input("**/*.go")
                .output("build/app")
                .after("generate")
                .build(),
        )
        .with_task(
            "docs",
            TaskConfigBuilder::new("mkdocs build")
                .input("docs/**/*.md")
                .output("site/index.html")
                .build(),
        )
        .with_task(
            "assemble",
            TaskConfigBuilder::aggregate().after("compile").build(),
        )
        .default_target("assemble")
        .build()
}

/// Runner that behaves like the real tools for [`pipeline_config`].
pub fn pipeline_runner(fs: &MockFileSystem) -> FakeRunner {
    FakeRunner::new(fs.clone())
        .generates_per_file("templ generate")
        .writes("go build", &["build/app"])
        .writes("mkdocs", &["site/index.html"])
}

pub fn engine(cfg: &ConfigFile, fs: &MockFileSystem, runner: &Arc<FakeRunner>) -> Engine {
    Engine::from_config_with(cfg, ".", Arc::new(fs.clone()), runner.clone())
        .expect("engine should build from a valid config")
}

pub fn exists(fs: &MockFileSystem, path: &str) -> bool {
    use builddag::fs::FileSystem;
    fs.exists(Path::new(path))
}
