// src/config/mod.rs

//! Configuration: TOML model, loading and validation, and conversion of a
//! validated [`ConfigFile`] into [`Task`]s.

pub mod loader;
pub mod model;
mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ConfigSection, DefaultSection, PerFileConfig, RawConfigFile, TaskConfig};

use std::time::Duration;

use crate::errors::{BuilddagError, Result};
use crate::state::STATE_DIR;
use crate::task::{Locator, OutputNaming, Task, TaskAction};
use crate::types::parse_duration;

impl ConfigFile {
    /// Tasks in declaration order.
    pub fn build_tasks(&self) -> Result<Vec<Task>> {
        self.task
            .iter()
            .map(|(name, tc)| self.build_task(name, tc))
            .collect()
    }

    fn build_task(&self, name: &str, tc: &TaskConfig) -> Result<Task> {
        let excludes = self.excludes_for(tc);
        let locator = |pattern: &String| {
            Locator::with_excludes(pattern, &excludes)
                .map_err(|e| BuilddagError::ConfigError(format!("task '{name}': {e:#}")))
        };

        let action = match (&tc.cmd, &tc.per_file) {
            (None, _) => TaskAction::Noop,
            (Some(cmd), None) => TaskAction::Command(cmd.clone()),
            (Some(cmd), Some(per_file)) => {
                let naming = match &per_file.output {
                    Some(template) => OutputNaming::new(template).map_err(|e| {
                        BuilddagError::ConfigError(format!("task '{name}': {e}"))
                    })?,
                    None => OutputNaming::default(),
                };
                TaskAction::PerFile {
                    cmd: cmd.clone(),
                    naming,
                }
            }
        };

        let mut task = Task::new(name, action)
            .generated(tc.generated)
            .timeout(parse_task_timeout(name, tc.timeout.as_deref())?);
        for pattern in &tc.inputs {
            task = task.input(locator(pattern)?);
        }
        for pattern in &tc.outputs {
            task = task.output(locator(pattern)?);
        }
        for dep in &tc.after {
            task = task.after(dep.clone());
        }
        for (key, value) in self.default.env.iter().chain(tc.env.iter()) {
            task = task.env(key.clone(), value.clone());
        }
        Ok(task)
    }

    /// `[default].exclude`, then the task's own excludes, then the state dir.
    fn excludes_for(&self, tc: &TaskConfig) -> Vec<String> {
        let mut excludes: Vec<String> = self
            .default
            .exclude
            .iter()
            .chain(tc.exclude.iter())
            .cloned()
            .collect();
        excludes.push(format!("{STATE_DIR}/**"));
        excludes
    }

    /// `[config].timeout`, parsed.
    pub fn default_timeout(&self) -> Result<Option<Duration>> {
        parse_task_timeout("[config]", self.config.timeout.as_deref())
    }

    /// Explicit `default_target`, else the last declared task.
    pub fn default_target(&self) -> Option<&str> {
        self.config
            .default_target
            .as_deref()
            .or_else(|| self.task.last().map(|(name, _)| name.as_str()))
    }
}

fn parse_task_timeout(owner: &str, raw: Option<&str>) -> Result<Option<Duration>> {
    raw.map(|s| {
        parse_duration(s).map_err(|e| BuilddagError::ConfigError(format!("{owner}: timeout: {e}")))
    })
    .transpose()
}
