// src/dag/report.rs

//! Result types for a build and for a dry run.

use std::fmt;

use crate::stale::StaleReason;
use crate::task::TaskName;

/// A task that ran, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTask {
    pub name: TaskName,
    pub reason: StaleReason,
}

/// Outcome of a successful [`super::Scheduler::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub target: TaskName,
    /// Tasks that ran, in execution order.
    pub executed: Vec<ExecutedTask>,
    /// Tasks found fresh, in execution order.
    pub skipped: Vec<TaskName>,
}

impl BuildReport {
    pub fn new(target: impl Into<TaskName>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn executed_names(&self) -> Vec<&str> {
        self.executed.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn was_executed(&self, task: &str) -> bool {
        self.executed.iter().any(|t| t.name == task)
    }

    pub fn is_up_to_date(&self) -> bool {
        self.executed.is_empty()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_up_to_date() {
            return write!(f, "'{}' is up to date", self.target);
        }
        write!(
            f,
            "built '{}': {} task(s) ran, {} up to date",
            self.target,
            self.executed.len(),
            self.skipped.len()
        )
    }
}

/// What a build would do with one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// Stale on its own.
    Run(StaleReason),
    /// Fresh now, but a dependency is going to run first.
    AfterUpstream,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub task: TaskName,
    pub action: PlanAction,
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            PlanAction::Run(reason) => write!(f, "run   {} ({reason})", self.task),
            PlanAction::AfterUpstream => {
                write!(f, "run?  {} (after a dependency runs)", self.task)
            }
            PlanAction::Skip => write!(f, "skip  {}", self.task),
        }
    }
}
