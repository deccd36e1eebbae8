// src/errors.rs

//! Crate-wide error types.
//!
//! Configuration problems surface as [`BuilddagError`]; everything that can go
//! wrong while a build is executing is a [`BuildError`], which wraps the more
//! specific [`StalenessCheckError`] and [`TaskRunError`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::task::TaskName;

/// The task graph contains a cycle. Only raised while the graph is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cycle detected in task graph involving {}", join_names(.tasks))]
pub struct CycleError {
    /// Tasks that take part in the cycle, in declaration order.
    pub tasks: Vec<TaskName>,
}

/// A locator could not be resolved (or a resolved file could not be
/// fingerprinted) while deciding whether a task is stale.
#[derive(Error, Debug)]
#[error("cannot check staleness of task '{task}' ({locator}): {cause:#}")]
pub struct StalenessCheckError {
    pub task: TaskName,
    pub locator: String,
    pub cause: anyhow::Error,
}

/// Running a task's action failed.
#[derive(Error, Debug)]
pub enum TaskRunError {
    #[error("task '{task}' failed{}: `{command}`\n{diagnostics}", exit_suffix(.code))]
    Failed {
        task: TaskName,
        command: String,
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("task '{task}' could not launch `{command}`: {error}")]
    Launch {
        task: TaskName,
        command: String,
        error: std::io::Error,
    },

    #[error("task '{task}' timed out after {after:?}")]
    TimedOut { task: TaskName, after: Duration },

    #[error("task '{task}' was cancelled")]
    Cancelled { task: TaskName },

    #[error("task '{task}' failed: {message}")]
    Action { task: TaskName, message: String },
}

impl TaskRunError {
    /// Name of the task that failed.
    pub fn task(&self) -> &str {
        match self {
            TaskRunError::Failed { task, .. }
            | TaskRunError::Launch { task, .. }
            | TaskRunError::TimedOut { task, .. }
            | TaskRunError::Cancelled { task }
            | TaskRunError::Action { task, .. } => task,
        }
    }
}

fn join_names(tasks: &[TaskName]) -> String {
    tasks.join(" -> ")
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}

/// Top-level error for a build, clean or plan request.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Staleness(#[from] StalenessCheckError),

    #[error(transparent)]
    TaskRun(#[from] TaskRunError),

    #[error("unknown task '{0}'")]
    UnknownTask(TaskName),

    #[error("output {path:?} of task '{task}' is already owned by task '{owner}'")]
    OutputConflict {
        task: TaskName,
        owner: TaskName,
        path: PathBuf,
    },

    #[error("another build holds the lock at {0:?}")]
    Locked(PathBuf),

    #[error("build state error: {0:#}")]
    State(anyhow::Error),
}

impl BuildError {
    /// Name of the failing task, when the error is attributable to one.
    pub fn task(&self) -> Option<&str> {
        match self {
            BuildError::Staleness(e) => Some(&e.task),
            BuildError::TaskRun(e) => Some(e.task()),
            BuildError::OutputConflict { task, .. } => Some(task),
            _ => None,
        }
    }
}

/// Crate-level error used by configuration loading and the CLI entry point.
#[derive(Error, Debug)]
pub enum BuilddagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuilddagError>;
