// src/config/validate.rs

use std::collections::{HashMap, HashSet};

use petgraph::graph::DiGraph;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::dag::graph::cycle_members;
use crate::errors::{BuilddagError, CycleError, Result};
use crate::task::{Locator, OutputNaming};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuilddagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task(cfg, name, task)?;
    }
    validate_unique_outputs(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> BuilddagError {
    BuilddagError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == Some(0) {
        return Err(config_error("[config].workers must be >= 1 (got 0)"));
    }

    if let Some(timeout) = &cfg.config.timeout {
        parse_duration(timeout)
            .map_err(|e| config_error(format!("[config].timeout: {e}")))?;
    }

    if let Some(target) = &cfg.config.default_target {
        if !cfg.task.iter().any(|(name, _)| name == target) {
            return Err(config_error(format!(
                "[config].default_target names unknown task '{target}'"
            )));
        }
    }

    for pattern in &cfg.default.exclude {
        Locator::new(pattern)
            .map_err(|e| config_error(format!("[default].exclude: {e:#}")))?;
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let names: HashSet<&str> = cfg.task.iter().map(|(n, _)| n.as_str()).collect();
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !names.contains(dep.as_str()) {
                return Err(config_error(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(config_error(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, as in the task graph.
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index = HashMap::new();

    for (name, _) in cfg.task.iter() {
        index.insert(name.as_str(), graph.add_node(name.as_str()));
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if let (Some(&from), Some(&to)) = (index.get(dep.as_str()), index.get(name.as_str())) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let members = cycle_members(&graph);
    if members.is_empty() {
        return Ok(());
    }
    Err(CycleError {
        tasks: members.into_iter().map(|idx| graph[idx].to_string()).collect(),
    }
    .into())
}

fn validate_task(cfg: &RawConfigFile, name: &str, task: &TaskConfig) -> Result<()> {
    let excludes: Vec<String> = cfg
        .default
        .exclude
        .iter()
        .chain(task.exclude.iter())
        .cloned()
        .collect();

    for pattern in task.inputs.iter().chain(task.outputs.iter()) {
        Locator::with_excludes(pattern, &excludes)
            .map_err(|e| config_error(format!("task '{name}': {e:#}")))?;
    }

    if let Some(timeout) = &task.timeout {
        parse_duration(timeout)
            .map_err(|e| config_error(format!("task '{name}': timeout: {e}")))?;
    }

    if task.generated && task.outputs.is_empty() {
        return Err(config_error(format!(
            "task '{name}' is marked `generated` but declares no outputs"
        )));
    }

    if let Some(per_file) = &task.per_file {
        if task.cmd.is_none() {
            return Err(config_error(format!(
                "task '{name}' uses `per_file` but has no `cmd`"
            )));
        }
        if task.inputs.is_empty() || task.outputs.is_empty() {
            return Err(config_error(format!(
                "task '{name}' uses `per_file` and must declare both inputs and outputs"
            )));
        }
        if let Some(template) = &per_file.output {
            OutputNaming::new(template)
                .map_err(|e| config_error(format!("task '{name}': per_file.output: {e}")))?;
        }
    }

    Ok(())
}

/// No two tasks may declare the same output pattern.
fn validate_unique_outputs(cfg: &RawConfigFile) -> Result<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut declared: Vec<(&str, Locator)> = Vec::new();
    for (name, task) in cfg.task.iter() {
        for pattern in task.outputs.iter() {
            let locator = Locator::new(pattern)
                .map_err(|e| config_error(format!("task '{name}' output: {e:#}")))?;
            if let Some(owner) = owners.insert(locator.pattern().to_string(), name.as_str()) {
                if owner != name {
                    return Err(config_error(format!(
                        "output '{pattern}' is declared by both task '{owner}' and task '{name}'"
                    )));
                }
            }
            declared.push((name.as_str(), locator));
        }
    }

    // A literal output must not fall under another task's output glob.
    for (name, literal) in declared.iter().filter(|(_, l)| l.is_literal()) {
        for (other, locator) in declared.iter() {
            if other != name && !locator.is_literal() && locator.matches(literal.pattern()) {
                return Err(config_error(format!(
                    "output '{literal}' of task '{name}' also matches output '{locator}' of task '{other}'"
                )));
            }
        }
    }
    Ok(())
}
