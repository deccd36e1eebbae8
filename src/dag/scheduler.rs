// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::dag::graph::TaskGraph;
use crate::dag::report::{BuildReport, ExecutedTask, PlanAction, PlanEntry};
use crate::errors::{BuildError, TaskRunError};
use crate::exec::CancelToken;
use crate::stale::{StalenessEvaluator, Verdict};
use crate::state::{unix_now, BuildState, RunRecord, StateStore};
use crate::task::Task;

/// Runs the stale part of a target's dependency closure, in order.
///
/// The scheduler borrows everything it needs for one build: the immutable
/// graph, the shared build context, and the mutable state plus the store it
/// is persisted to after every change.
pub struct Scheduler<'a> {
    graph: &'a TaskGraph,
    ctx: &'a BuildContext,
    state: &'a mut BuildState,
    store: &'a dyn StateStore,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        ctx: &'a BuildContext,
        state: &'a mut BuildState,
        store: &'a dyn StateStore,
    ) -> Self {
        Self {
            graph,
            ctx,
            state,
            store,
        }
    }

    /// Bring `target` up to date.
    ///
    /// Tasks are visited in [`TaskGraph::execution_order`]. Fresh tasks are
    /// skipped; stale ones run and their outputs are re-resolved afterwards,
    /// so dependents see what was actually produced. The first failure stops
    /// the build; outputs of the failed task are left in place and its run
    /// record is discarded.
    pub async fn execute(
        &mut self,
        target: &str,
        cancel: &CancelToken,
    ) -> Result<BuildReport, BuildError> {
        let graph = self.graph;
        let ctx = self.ctx;
        let order = graph.execution_order(target)?;
        let evaluator = StalenessEvaluator::new(ctx);
        let mut published: HashMap<&str, Vec<PathBuf>> = HashMap::new();
        let mut claims: HashMap<PathBuf, &str> = HashMap::new();
        let mut report = BuildReport::new(target);

        info!(target, tasks = order.len(), "starting build");

        for task in order {
            let name = task.name();
            if cancel.is_cancelled() {
                return Err(TaskRunError::Cancelled {
                    task: name.to_string(),
                }
                .into());
            }

            let upstream = self.upstream_outputs(task, &published);
            let evaluation = evaluator.evaluate(task, &upstream, self.state.record(name))?;

            let reason = match evaluation.verdict {
                Verdict::Fresh => {
                    debug!(task = %name, "up to date; skipping");
                    let outputs = evaluation.snapshot.output_paths();
                    self.claim_outputs(name, &outputs, &mut claims)?;
                    if task.is_generated() {
                        self.state
                            .artifacts
                            .record_outputs(name, &outputs, unix_now())?;
                    }
                    published.insert(name, outputs);
                    report.skipped.push(name.to_string());
                    continue;
                }
                Verdict::Stale(reason) => reason,
            };

            info!(task = %name, reason = %reason, "running task");
            if let Err(err) = task.run(ctx, cancel).await {
                warn!(task = %name, error = %err, "task failed");
                self.state.discard_record(name);
                if let Err(save_err) = self.store.save(&*self.state) {
                    warn!(error = %format!("{save_err:#}"), "could not persist build state");
                }
                return Err(err.into());
            }

            let after = evaluator.snapshot(task, &upstream)?;
            let outputs = after.output_paths();
            if let Some(locator) = after.empty_outputs.first() {
                warn!(task = %name, locator = %locator, "task produced no files for an output");
            }

            if let Err(err) = self.claim_outputs(name, &outputs, &mut claims) {
                warn!(task = %name, error = %err, "task wrote another task's output");
                self.state.discard_record(name);
                if let Err(save_err) = self.store.save(&*self.state) {
                    warn!(error = %format!("{save_err:#}"), "could not persist build state");
                }
                return Err(err);
            }

            let finished_at = unix_now();
            if task.is_generated() {
                self.state
                    .artifacts
                    .record_outputs(name, &outputs, finished_at)?;
            }
            self.state
                .set_record(name, RunRecord::from_snapshot(after, finished_at));
            self.persist()?;

            info!(task = %name, outputs = outputs.len(), "task finished");
            published.insert(name, outputs);
            report.executed.push(ExecutedTask {
                name: name.to_string(),
                reason,
            });
        }

        self.persist()?;
        info!(
            target,
            ran = report.executed.len(),
            skipped = report.skipped.len(),
            "build finished"
        );
        Ok(report)
    }

    /// Dry run: what [`Scheduler::execute`] would do right now.
    ///
    /// A fresh task downstream of a task that will run is reported as
    /// [`PlanAction::AfterUpstream`], since whether it runs depends on what
    /// its dependency produces.
    pub fn plan(&self, target: &str) -> Result<Vec<PlanEntry>, BuildError> {
        let order = self.graph.execution_order(target)?;
        let evaluator = StalenessEvaluator::new(self.ctx);
        let mut published: HashMap<&str, Vec<PathBuf>> = HashMap::new();
        let mut will_run: HashSet<&str> = HashSet::new();
        let mut plan = Vec::with_capacity(order.len());

        for task in order {
            let name = task.name();
            let upstream = self.upstream_outputs(task, &published);
            let evaluation = evaluator.evaluate(task, &upstream, self.state.record(name))?;

            let action = match evaluation.verdict {
                Verdict::Stale(reason) => PlanAction::Run(reason),
                Verdict::Fresh if task.deps().iter().any(|d| will_run.contains(d.as_str())) => {
                    PlanAction::AfterUpstream
                }
                Verdict::Fresh => PlanAction::Skip,
            };
            if action != PlanAction::Skip {
                will_run.insert(name);
            }

            published.insert(name, evaluation.snapshot.output_paths());
            plan.push(PlanEntry {
                task: name.to_string(),
                action,
            });
        }

        Ok(plan)
    }

    fn upstream_outputs(
        &self,
        task: &Task,
        published: &HashMap<&str, Vec<PathBuf>>,
    ) -> Vec<PathBuf> {
        let mut upstream: Vec<PathBuf> = self
            .graph
            .dependencies_of(task.name())
            .into_iter()
            .filter_map(|dep| published.get(dep))
            .flatten()
            .cloned()
            .collect();
        upstream.sort();
        upstream.dedup();
        upstream
    }

    /// Claim `outputs` for `task` within this build.
    ///
    /// A path is owned by the first task in the build that resolved it, or by
    /// a configured task the artifact tracker already lists as its producer.
    fn claim_outputs<'t>(
        &self,
        task: &'t str,
        outputs: &[PathBuf],
        claims: &mut HashMap<PathBuf, &'t str>,
    ) -> Result<(), BuildError> {
        for path in outputs {
            let owner = claims.get(path).copied().or_else(|| {
                self.state
                    .artifacts
                    .owner_of(path)
                    .filter(|owner| self.graph.contains(owner))
            });
            if let Some(owner) = owner.filter(|owner| *owner != task) {
                return Err(BuildError::OutputConflict {
                    task: task.to_string(),
                    owner: owner.to_string(),
                    path: path.clone(),
                });
            }
        }
        for path in outputs {
            claims.insert(path.clone(), task);
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), BuildError> {
        self.store.save(&*self.state).map_err(BuildError::State)
    }
}
