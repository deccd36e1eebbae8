// src/exec/pool.rs

//! Bounded worker pool for per-file generation.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::run_command;
use super::runner::{CommandSpec, Runner};
use crate::errors::TaskRunError;

/// Run independent commands with at most `workers` in flight.
///
/// Commands may finish in any order. The first failure aborts every job that
/// is still queued or running (their processes are killed on drop) and is
/// returned; `Ok` means every command succeeded.
pub async fn run_all(
    runner: Arc<dyn Runner>,
    task: &str,
    specs: Vec<CommandSpec>,
    workers: usize,
    cancel: &CancelToken,
) -> Result<(), TaskRunError> {
    let total = specs.len();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut join_set = JoinSet::new();

    debug!(task, jobs = total, workers, "starting per-file jobs");

    for spec in specs {
        let runner = Arc::clone(&runner);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let task = task.to_string();

        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| TaskRunError::Cancelled { task: task.clone() })?;
            run_command(runner.as_ref(), &task, &spec, cancel).await
        });
    }

    let mut finished = 0usize;
    while let Some(joined) = join_set.join_next().await {
        let failure = match joined {
            Ok(Ok(())) => {
                finished += 1;
                continue;
            }
            Ok(Err(err)) => err,
            Err(join_err) => TaskRunError::Action {
                task: task.to_string(),
                message: format!("per-file job panicked: {join_err}"),
            },
        };

        warn!(
            task,
            finished,
            total,
            "per-file job failed; aborting remaining jobs"
        );
        join_set.abort_all();
        while join_set.join_next().await.is_some() {}
        return Err(failure);
    }

    debug!(task, jobs = total, "all per-file jobs finished");
    Ok(())
}
