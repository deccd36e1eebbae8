// src/state/mod.rs

//! Build state that survives between invocations.
//!
//! - [`artifacts`] tracks generated outputs so `clean` can remove exactly
//!   those.
//! - [`store`] persists [`BuildState`] to `.builddag/state.json` (or keeps it
//!   in memory).
//! - [`lock`] serialises concurrent builds of the same project.

pub mod artifacts;
pub mod lock;
pub mod store;

pub use artifacts::{ArtifactRecord, ArtifactTracker, CleanReport};
pub use lock::BuildLock;
pub use store::{store_for_mode, FileStateStore, MemoryStateStore, StateStore};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::FileSystem;
use crate::stale::{Fingerprint, Snapshot};
use crate::task::TaskName;

/// Name of the state directory under the project root.
pub const STATE_DIR: &str = ".builddag";

/// Fingerprints observed right after a task's last successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub inputs: BTreeMap<PathBuf, Fingerprint>,
    pub outputs: BTreeMap<PathBuf, Fingerprint>,
    /// Seconds since the Unix epoch.
    pub finished_at: u64,
}

impl RunRecord {
    pub fn from_snapshot(snapshot: Snapshot, finished_at: u64) -> Self {
        Self {
            inputs: snapshot.inputs,
            outputs: snapshot.outputs,
            finished_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildState {
    pub runs: BTreeMap<TaskName, RunRecord>,
    pub artifacts: ArtifactTracker,
}

impl BuildState {
    pub fn record(&self, task: &str) -> Option<&RunRecord> {
        self.runs.get(task)
    }

    pub fn set_record(&mut self, task: &str, record: RunRecord) {
        self.runs.insert(task.to_string(), record);
    }

    /// Forget a task's last run so the next build reruns it.
    pub fn discard_record(&mut self, task: &str) {
        if self.runs.remove(task).is_some() {
            debug!(task, "discarded run record");
        }
    }

    /// Drop run records of tasks that are no longer configured.
    pub fn retain_tasks<'a>(&mut self, tasks: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::BTreeSet<&str> = tasks.into_iter().collect();
        self.runs.retain(|name, _| {
            let known = keep.contains(name.as_str());
            if !known {
                debug!(task = %name, "pruning run record of unconfigured task");
            }
            known
        });
    }

    /// Remove the recorded outputs of `generation_tasks` and forget the runs
    /// that produced them.
    pub fn clean(
        &mut self,
        fs: &dyn FileSystem,
        root: &Path,
        generation_tasks: &[&str],
    ) -> anyhow::Result<CleanReport> {
        let report = self.artifacts.clean(fs, root, generation_tasks)?;
        for task in &report.tasks {
            self.discard_record(task);
        }
        Ok(report)
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
