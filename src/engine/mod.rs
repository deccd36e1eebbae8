// src/engine/mod.rs

//! Build engine for builddag.
//!
//! Ties a validated configuration to the pieces that act on it:
//! - the [`TaskGraph`] built from the configured tasks,
//! - the [`BuildContext`] (filesystem, runner, fingerprint strategy),
//! - the persisted [`BuildState`] and the [`StateStore`] behind it.
//!
//! One engine serves any number of `assemble`, `clean` and `plan` requests;
//! state is loaded once and saved after every change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::context::BuildContext;
use crate::dag::{BuildReport, PlanEntry, Scheduler, TaskGraph};
use crate::errors::{BuildError, Result};
use crate::exec::{CancelToken, ProcessRunner, Runner};
use crate::fs::{FileSystem, RealFileSystem};
use crate::stale::strategy_for_mode;
use crate::state::{store_for_mode, BuildState, CleanReport, StateStore};
use crate::task::TaskName;

pub struct Engine {
    graph: TaskGraph,
    ctx: BuildContext,
    store: Arc<dyn StateStore>,
    state: BuildState,
    default_target: Option<TaskName>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ctx", &self.ctx)
            .field("tasks", &self.graph.len())
            .field("default_target", &self.default_target)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over an already-built graph. Loads the persisted state and
    /// drops run records of tasks the graph no longer has.
    pub fn new(
        graph: TaskGraph,
        ctx: BuildContext,
        store: Arc<dyn StateStore>,
    ) -> std::result::Result<Self, BuildError> {
        let mut state = store.load().map_err(BuildError::State)?;
        state.retain_tasks(graph.tasks().map(|t| t.name()));
        debug!(
            runs = state.runs.len(),
            artifacts = state.artifacts.len(),
            "loaded build state"
        );

        let default_target = graph
            .topological_order()
            .last()
            .map(|t| t.name().to_string());

        Ok(Self {
            graph,
            ctx,
            store,
            state,
            default_target,
        })
    }

    /// Production engine: real filesystem and process runner, rooted at
    /// `[config].root` relative to the config file's directory.
    pub fn from_config(cfg: &ConfigFile, config_path: &Path) -> Result<Self> {
        let root = config_dir(config_path).join(&cfg.config.root);
        Self::from_config_with(
            cfg,
            root,
            Arc::new(RealFileSystem),
            Arc::new(ProcessRunner::new()),
        )
    }

    /// Engine for `cfg` with explicit collaborators.
    pub fn from_config_with(
        cfg: &ConfigFile,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        runner: Arc<dyn Runner>,
    ) -> Result<Self> {
        let root = root.into();
        let graph = TaskGraph::new(cfg.build_tasks()?)?;

        let mut ctx = BuildContext::new(root.clone(), Arc::clone(&fs), runner)
            .with_fingerprints(strategy_for_mode(cfg.config.fingerprint))
            .with_default_timeout(cfg.default_timeout()?);
        if let Some(workers) = cfg.config.workers {
            ctx = ctx.with_workers(workers);
        }

        let store = store_for_mode(cfg.config.state, fs, &root);
        let mut engine = Self::new(graph, ctx, store)?;
        engine.default_target = cfg.default_target().map(str::to_string);
        Ok(engine)
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    /// Bring `target` (or the default target) up to date.
    pub async fn assemble(
        &mut self,
        target: Option<&str>,
        cancel: &CancelToken,
    ) -> std::result::Result<BuildReport, BuildError> {
        let target = self.resolve_target(target)?;
        let mut scheduler = Scheduler::new(
            &self.graph,
            &self.ctx,
            &mut self.state,
            self.store.as_ref(),
        );
        scheduler.execute(&target, cancel).await
    }

    /// Remove every recorded output of the configured generation tasks.
    pub fn clean(&mut self) -> std::result::Result<CleanReport, BuildError> {
        let generation_tasks: Vec<&str> = self
            .graph
            .tasks()
            .filter(|t| t.is_generated())
            .map(|t| t.name())
            .collect();

        let result = self
            .state
            .clean(self.ctx.fs(), self.ctx.root(), &generation_tasks);
        self.store.save(&self.state).map_err(BuildError::State)?;

        let report = result.map_err(BuildError::State)?;
        info!(
            removed = report.removed.len(),
            already_missing = report.already_missing.len(),
            "clean finished"
        );
        Ok(report)
    }

    /// What `assemble(target)` would do, without running anything.
    pub fn plan(&mut self, target: Option<&str>) -> std::result::Result<Vec<PlanEntry>, BuildError> {
        let target = self.resolve_target(target)?;
        let scheduler = Scheduler::new(
            &self.graph,
            &self.ctx,
            &mut self.state,
            self.store.as_ref(),
        );
        scheduler.plan(&target)
    }

    fn resolve_target(&self, target: Option<&str>) -> std::result::Result<TaskName, BuildError> {
        match target.or(self.default_target.as_deref()) {
            Some(name) if self.graph.contains(name) => Ok(name.to_string()),
            Some(name) => Err(BuildError::UnknownTask(name.to_string())),
            None => Err(BuildError::UnknownTask(String::new())),
        }
    }
}

/// Directory holding the config file; `.` for a bare file name.
fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
