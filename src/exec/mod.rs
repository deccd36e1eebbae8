// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`runner`] defines the [`Runner`] capability and its data types.
//! - [`process`] is the production runner on top of `tokio::process`.
//! - [`cancel`] carries the build-wide cancellation signal.
//! - [`pool`] fans per-file commands out over a bounded worker pool.

pub mod cancel;
pub mod pool;
pub mod process;
pub mod runner;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use process::ProcessRunner;
pub use runner::{CommandOutput, CommandSpec, RunFuture, Runner, RunnerError};

use tracing::{debug, info};

use crate::errors::TaskRunError;

/// Run one command for `task` and translate the result into a task outcome.
pub async fn run_command(
    runner: &dyn Runner,
    task: &str,
    spec: &CommandSpec,
    cancel: CancelToken,
) -> Result<(), TaskRunError> {
    info!(task, cmd = %spec, "running command");

    match runner.run(spec, cancel).await {
        Ok(output) if output.is_success() => {
            for line in output.stdout.lines() {
                debug!(task, "stdout: {}", line);
            }
            Ok(())
        }
        Ok(output) => Err(TaskRunError::Failed {
            task: task.to_string(),
            command: spec.to_string(),
            code: output.code,
            diagnostics: output.diagnostics(),
        }),
        Err(RunnerError::Launch { error, .. }) => Err(TaskRunError::Launch {
            task: task.to_string(),
            command: spec.to_string(),
            error,
        }),
        Err(RunnerError::TimedOut(after)) => Err(TaskRunError::TimedOut {
            task: task.to_string(),
            after,
        }),
        Err(RunnerError::Cancelled) => Err(TaskRunError::Cancelled {
            task: task.to_string(),
        }),
    }
}
