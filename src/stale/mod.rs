// src/stale/mod.rs

//! Staleness evaluation.
//!
//! - [`fingerprint`] defines how a single file is fingerprinted
//!   (modification time or content hash).
//! - [`hash`] and [`cache`] implement content hashing with blake3.
//!
//! The [`StalenessEvaluator`] resolves a task's locators, fingerprints every
//! resolved file and compares the result with the task's last successful
//! run.

pub mod cache;
pub mod fingerprint;
pub mod hash;

pub use fingerprint::{
    strategy_for_mode, ContentHashStrategy, Fingerprint, FingerprintStrategy, TimestampStrategy,
};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::context::BuildContext;
use crate::errors::StalenessCheckError;
use crate::state::RunRecord;
use crate::task::Task;

/// Why a task has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No successful run has been recorded.
    NeverRun,
    /// An output locator resolves to no files.
    MissingOutputs { locator: String },
    /// A file recorded as output of the last run is gone.
    OutputRemoved { path: PathBuf },
    /// An input appeared or disappeared since the last run.
    InputSetChanged { path: PathBuf },
    /// An input's fingerprint differs from the last run.
    InputChanged { path: PathBuf },
    /// An output is older than an input (timestamp fingerprints only).
    OutputOlderThanInput { output: PathBuf, input: PathBuf },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NeverRun => f.write_str("no successful run recorded"),
            StaleReason::MissingOutputs { locator } => {
                write!(f, "output '{locator}' resolves to no files")
            }
            StaleReason::OutputRemoved { path } => write!(f, "output {:?} was removed", path),
            StaleReason::InputSetChanged { path } => {
                write!(f, "input {:?} was added or removed", path)
            }
            StaleReason::InputChanged { path } => write!(f, "input {:?} changed", path),
            StaleReason::OutputOlderThanInput { output, input } => {
                write!(f, "output {:?} is older than input {:?}", output, input)
            }
        }
    }
}

/// Result of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Fresh,
    Stale(StaleReason),
}

impl Verdict {
    pub fn is_stale(&self) -> bool {
        matches!(self, Verdict::Stale(_))
    }
}

/// Fingerprints of a task's resolved inputs and outputs at one moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub inputs: BTreeMap<PathBuf, Fingerprint>,
    pub outputs: BTreeMap<PathBuf, Fingerprint>,
    /// Output locators that resolved to no files.
    pub empty_outputs: Vec<String>,
}

impl Snapshot {
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.outputs.keys().cloned().collect()
    }
}

/// Outcome of [`StalenessEvaluator::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub snapshot: Snapshot,
}

pub struct StalenessEvaluator<'a> {
    ctx: &'a BuildContext,
}

impl<'a> StalenessEvaluator<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    /// Resolve and fingerprint a task's files.
    ///
    /// Effective inputs are the declared inputs plus `upstream` (the outputs
    /// of direct dependencies), minus the task's own outputs.
    pub fn snapshot(
        &self,
        task: &Task,
        upstream: &[PathBuf],
    ) -> Result<Snapshot, StalenessCheckError> {
        let mut snapshot = Snapshot::default();

        for locator in task.outputs() {
            let files = locator
                .resolve(self.ctx.fs(), self.ctx.root())
                .map_err(|cause| check_error(task, locator.pattern(), cause))?;
            if files.is_empty() {
                snapshot.empty_outputs.push(locator.pattern().to_string());
            }
            for path in files {
                let fp = self.fingerprint(task, &path)?;
                snapshot.outputs.insert(path, fp);
            }
        }

        let mut inputs = task.resolve_inputs(self.ctx)?;
        inputs.extend(upstream.iter().cloned());
        for path in inputs {
            if snapshot.outputs.contains_key(&path) || snapshot.inputs.contains_key(&path) {
                continue;
            }
            let fp = self.fingerprint(task, &path)?;
            snapshot.inputs.insert(path, fp);
        }

        trace!(
            task = %task.name(),
            inputs = snapshot.inputs.len(),
            outputs = snapshot.outputs.len(),
            "took snapshot"
        );
        Ok(snapshot)
    }

    /// Decide whether `task` is stale relative to `record`, its last
    /// successful run.
    pub fn evaluate(
        &self,
        task: &Task,
        upstream: &[PathBuf],
        record: Option<&RunRecord>,
    ) -> Result<Evaluation, StalenessCheckError> {
        let snapshot = self.snapshot(task, upstream)?;
        let verdict = match compare(&snapshot, record) {
            Some(reason) => Verdict::Stale(reason),
            None => Verdict::Fresh,
        };
        Ok(Evaluation { verdict, snapshot })
    }

    fn fingerprint(&self, task: &Task, path: &Path) -> Result<Fingerprint, StalenessCheckError> {
        self.ctx
            .fingerprints()
            .fingerprint(self.ctx.fs(), &self.ctx.abs(path))
            .map_err(|cause| check_error(task, &path.to_string_lossy(), cause))
    }
}

fn check_error(task: &Task, locator: &str, cause: anyhow::Error) -> StalenessCheckError {
    StalenessCheckError {
        task: task.name().to_string(),
        locator: locator.to_string(),
        cause,
    }
}

/// First reason the snapshot is stale relative to the record, if any.
fn compare(snapshot: &Snapshot, record: Option<&RunRecord>) -> Option<StaleReason> {
    if let Some(locator) = snapshot.empty_outputs.first() {
        return Some(StaleReason::MissingOutputs {
            locator: locator.clone(),
        });
    }

    let Some(record) = record else {
        return Some(StaleReason::NeverRun);
    };

    if let Some(path) = record
        .outputs
        .keys()
        .find(|p| !snapshot.outputs.contains_key(*p))
    {
        return Some(StaleReason::OutputRemoved { path: path.clone() });
    }

    if let Some(path) = symmetric_difference(&record.inputs, &snapshot.inputs) {
        return Some(StaleReason::InputSetChanged { path });
    }

    if let Some((path, _)) = snapshot
        .inputs
        .iter()
        .find(|(path, fp)| record.inputs.get(*path) != Some(*fp))
    {
        return Some(StaleReason::InputChanged { path: path.clone() });
    }

    older_output(snapshot)
}

fn symmetric_difference(
    a: &BTreeMap<PathBuf, Fingerprint>,
    b: &BTreeMap<PathBuf, Fingerprint>,
) -> Option<PathBuf> {
    a.keys()
        .find(|p| !b.contains_key(*p))
        .or_else(|| b.keys().find(|p| !a.contains_key(*p)))
        .cloned()
}

/// With time-based fingerprints, an output older than the newest input is
/// stale even when the record agrees (e.g. the record was written by a run
/// whose outputs were later restored from an older copy).
fn older_output(snapshot: &Snapshot) -> Option<StaleReason> {
    let newest_input = snapshot
        .inputs
        .iter()
        .filter_map(|(p, fp)| fp.stamp().map(|s| (s, p)))
        .max_by_key(|(s, _)| *s)?;
    let oldest_output = snapshot
        .outputs
        .iter()
        .filter_map(|(p, fp)| fp.stamp().map(|s| (s, p)))
        .min_by_key(|(s, _)| *s)?;

    if oldest_output.0 < newest_input.0 {
        Some(StaleReason::OutputOlderThanInput {
            output: oldest_output.1.clone(),
            input: newest_input.1.clone(),
        })
    } else {
        None
    }
}
