// src/task/mod.rs

//! Build tasks: declared inputs and outputs plus an action.
//!
//! - [`locator`] turns glob patterns into concrete file lists on demand.
//! - [`naming`] maps a source template to its generated file name.

pub mod locator;
pub mod naming;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::context::BuildContext;
use crate::errors::{StalenessCheckError, TaskRunError};
use crate::exec::{pool, run_command, CancelToken, CommandSpec};
use crate::stale::{StalenessEvaluator, Verdict};
use crate::state::RunRecord;

pub use locator::Locator;
pub use naming::OutputNaming;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// In-process action, for library users that do not shell out.
pub type TaskFn = Arc<dyn Fn(&ActionContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// What a task does when it is stale.
#[derive(Clone)]
pub enum TaskAction {
    /// Aggregate task (e.g. `assemble`): nothing to run.
    Noop,
    /// One shell command line.
    Command(String),
    /// One command per resolved input; `{input}` and `{output}` in the
    /// command line are replaced per file.
    PerFile { cmd: String, naming: OutputNaming },
    /// In-process function.
    Function(TaskFn),
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskAction::Noop => f.write_str("Noop"),
            TaskAction::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            TaskAction::PerFile { cmd, naming } => f
                .debug_struct("PerFile")
                .field("cmd", cmd)
                .field("naming", &naming.template())
                .finish(),
            TaskAction::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Arguments passed to a [`TaskAction::Function`].
pub struct ActionContext<'a> {
    pub task: &'a str,
    pub ctx: &'a BuildContext,
    /// Resolved inputs, root-relative.
    pub inputs: &'a [PathBuf],
}

/// A unit of declared-input / declared-output work.
#[derive(Debug, Clone)]
pub struct Task {
    name: TaskName,
    inputs: Vec<Locator>,
    outputs: Vec<Locator>,
    action: TaskAction,
    deps: Vec<TaskName>,
    generated: bool,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl Task {
    pub fn new(name: impl Into<TaskName>, action: TaskAction) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            action,
            deps: Vec::new(),
            generated: false,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn input(mut self, locator: Locator) -> Self {
        self.inputs.push(locator);
        self
    }

    pub fn output(mut self, locator: Locator) -> Self {
        self.outputs.push(locator);
        self
    }

    pub fn after(mut self, dep: impl Into<TaskName>) -> Self {
        self.deps.push(dep.into());
        self
    }

    /// Mark outputs as generated sources, tracked for `clean`.
    pub fn generated(mut self, generated: bool) -> Self {
        self.generated = generated;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Locator] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Locator] {
        &self.outputs
    }

    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    pub fn deps(&self) -> &[TaskName] {
        &self.deps
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Whether the task must run, given its last successful run (if any)
    /// and the resolved outputs of its direct dependencies.
    pub fn is_stale(
        &self,
        ctx: &BuildContext,
        record: Option<&RunRecord>,
        upstream: &[PathBuf],
    ) -> Result<Verdict, StalenessCheckError> {
        let evaluation = StalenessEvaluator::new(ctx).evaluate(self, upstream, record)?;
        Ok(evaluation.verdict)
    }

    /// Resolve the declared inputs.
    pub fn resolve_inputs(&self, ctx: &BuildContext) -> Result<Vec<PathBuf>, StalenessCheckError> {
        resolve_locators(&self.name, &self.inputs, ctx)
    }

    /// Resolve the declared outputs.
    pub fn resolve_outputs(&self, ctx: &BuildContext) -> Result<Vec<PathBuf>, StalenessCheckError> {
        resolve_locators(&self.name, &self.outputs, ctx)
    }

    /// Execute the action.
    ///
    /// Outputs of a failed run are left as they are.
    pub async fn run(&self, ctx: &BuildContext, cancel: &CancelToken) -> Result<(), TaskRunError> {
        if cancel.is_cancelled() {
            return Err(TaskRunError::Cancelled {
                task: self.name.clone(),
            });
        }

        match &self.action {
            TaskAction::Noop => {
                debug!(task = %self.name, "aggregate task; nothing to run");
                Ok(())
            }
            TaskAction::Command(line) => {
                let spec = self.command_spec(ctx, line.clone());
                run_command(ctx.runner().as_ref(), &self.name, &spec, cancel.clone()).await
            }
            TaskAction::PerFile { cmd, naming } => {
                let sources = self.source_files(ctx)?;
                let specs = sources
                    .iter()
                    .map(|source| {
                        let output = naming.output_for(source);
                        let line = render_per_file(cmd, source, &output);
                        self.command_spec(ctx, line)
                    })
                    .collect();
                pool::run_all(
                    Arc::clone(ctx.runner()),
                    &self.name,
                    specs,
                    ctx.workers(),
                    cancel,
                )
                .await
            }
            TaskAction::Function(action) => {
                let inputs = self.source_files(ctx)?;
                let args = ActionContext {
                    task: &self.name,
                    ctx,
                    inputs: &inputs,
                };
                action(&args).map_err(|e| TaskRunError::Action {
                    task: self.name.clone(),
                    message: format!("{e:#}"),
                })
            }
        }
    }

    /// Resolved inputs that are not also outputs of this task.
    fn source_files(&self, ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskRunError> {
        let as_action_error = |e: StalenessCheckError| TaskRunError::Action {
            task: self.name.clone(),
            message: e.to_string(),
        };
        let mut inputs = self.resolve_inputs(ctx).map_err(as_action_error)?;
        let outputs = self.resolve_outputs(ctx).map_err(as_action_error)?;
        inputs.retain(|p| outputs.binary_search(p).is_err());
        Ok(inputs)
    }

    fn command_spec(&self, ctx: &BuildContext, line: String) -> CommandSpec {
        CommandSpec::shell(line)
            .cwd(ctx.root())
            .envs(&self.env)
            .timeout(self.timeout.or(ctx.default_timeout()))
    }
}

fn resolve_locators(
    task: &str,
    locators: &[Locator],
    ctx: &BuildContext,
) -> Result<Vec<PathBuf>, StalenessCheckError> {
    let mut files = Vec::new();
    for locator in locators {
        let resolved = locator
            .resolve(ctx.fs(), ctx.root())
            .map_err(|cause| StalenessCheckError {
                task: task.to_string(),
                locator: locator.pattern().to_string(),
                cause,
            })?;
        files.extend(resolved);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn render_per_file(cmd: &str, input: &Path, output: &Path) -> String {
    cmd.replace("{input}", &locator::to_slash(input))
        .replace("{output}", &locator::to_slash(output))
}
