// src/state/artifacts.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::BuildError;
use crate::fs::FileSystem;
use crate::task::TaskName;

/// A generated file and the task that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub task: TaskName,
    /// Seconds since the Unix epoch.
    pub generated_at: u64,
}

/// What [`ArtifactTracker::clean`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    /// Recorded paths that were already gone.
    pub already_missing: Vec<PathBuf>,
    /// Tasks whose artifacts were cleaned.
    pub tasks: BTreeSet<TaskName>,
}

/// Root-relative generated paths, keyed by path.
///
/// Only generation tasks record outputs here, so a hand-written source can
/// never end up in the tracker unless a task claims it as its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactTracker {
    records: BTreeMap<PathBuf, ArtifactRecord>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `task`'s recorded outputs with `paths`.
    ///
    /// Paths the task recorded before but did not produce this time are
    /// dropped. Fails without changing anything if another task already owns
    /// one of the paths.
    pub fn record_outputs(
        &mut self,
        task: &str,
        paths: &[PathBuf],
        generated_at: u64,
    ) -> Result<(), BuildError> {
        for path in paths {
            if let Some(existing) = self.records.get(path) {
                if existing.task != task {
                    return Err(BuildError::OutputConflict {
                        task: task.to_string(),
                        owner: existing.task.clone(),
                        path: path.clone(),
                    });
                }
            }
        }

        let produced: BTreeSet<&PathBuf> = paths.iter().collect();
        self.records
            .retain(|path, record| record.task != task || produced.contains(path));

        for path in paths {
            self.records.insert(
                path.clone(),
                ArtifactRecord {
                    task: task.to_string(),
                    generated_at,
                },
            );
        }
        debug!(task, count = paths.len(), "recorded generated outputs");
        Ok(())
    }

    pub fn owner_of(&self, path: &Path) -> Option<&str> {
        self.records.get(path).map(|r| r.task.as_str())
    }

    /// Recorded paths of one task, sorted.
    pub fn outputs_of(&self, task: &str) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter(|(_, r)| r.task == task)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Delete every recorded file owned by one of `generation_tasks`.
    ///
    /// Missing files are not an error. Records of other tasks are left
    /// alone, as are records that do not stay inside the project root.
    pub fn clean(
        &mut self,
        fs: &dyn FileSystem,
        root: &Path,
        generation_tasks: &[&str],
    ) -> anyhow::Result<CleanReport> {
        let owned: BTreeSet<&str> = generation_tasks.iter().copied().collect();
        let mut report = CleanReport::default();

        let candidates: Vec<(PathBuf, TaskName)> = self
            .records
            .iter()
            .filter(|(_, r)| owned.contains(r.task.as_str()))
            .map(|(p, r)| (p.clone(), r.task.clone()))
            .collect();

        for (path, task) in candidates {
            if !is_contained(&path) {
                warn!(path = ?path, task = %task, "refusing to clean path outside the project root");
                continue;
            }

            let abs = root.join(&path);
            if fs.is_file(&abs) {
                fs.remove_file(&abs)
                    .with_context(|| format!("cleaning output of task '{task}'"))?;
                info!(path = ?path, task = %task, "removed generated file");
                report.removed.push(path.clone());
            } else {
                debug!(path = ?path, task = %task, "generated file already gone");
                report.already_missing.push(path.clone());
            }

            self.records.remove(&path);
            report.tasks.insert(task);
        }

        Ok(report)
    }
}

/// Relative path made only of normal components.
fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn conflicting_owner_is_rejected() {
        let mut tracker = ArtifactTracker::new();
        let path = PathBuf::from("view/a_generated.tmpl");
        tracker.record_outputs("generate", &[path.clone()], 1).unwrap();

        let err = tracker.record_outputs("other", &[path.clone()], 2).unwrap_err();
        assert!(matches!(err, BuildError::OutputConflict { ref owner, .. } if owner == "generate"));
        assert_eq!(tracker.owner_of(&path), Some("generate"));
    }

    #[test]
    fn rerecording_drops_outputs_no_longer_produced() {
        let mut tracker = ArtifactTracker::new();
        let a = PathBuf::from("a_generated.tmpl");
        let b = PathBuf::from("b_generated.tmpl");
        tracker.record_outputs("generate", &[a.clone(), b.clone()], 1).unwrap();
        tracker.record_outputs("generate", &[b.clone()], 2).unwrap();

        assert_eq!(tracker.outputs_of("generate"), vec![b]);
    }

    #[test]
    fn clean_skips_paths_escaping_the_root() {
        let fs = MockFileSystem::new();
        fs.add_file("keep.txt", "x");

        let mut tracker = ArtifactTracker::new();
        tracker
            .record_outputs("generate", &[PathBuf::from("../keep.txt")], 1)
            .unwrap();

        let report = tracker.clean(&fs, Path::new("."), &["generate"]).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(tracker.len(), 1);
    }
}
