// src/exec/process.rs

//! Real [`Runner`] backed by `tokio::process::Command`.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::runner::{CommandOutput, CommandSpec, RunFuture, Runner, RunnerError};

/// Spawns OS processes.
///
/// Children are created with `kill_on_drop(true)`: whenever the wait future
/// loses the race against cancellation or the timeout, it is dropped and the
/// child is killed with it.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for ProcessRunner {
    fn run<'a>(&'a self, spec: &'a CommandSpec, cancel: CancelToken) -> RunFuture<'a> {
        Box::pin(run_process(spec, cancel))
    }
}

async fn run_process(
    spec: &CommandSpec,
    mut cancel: CancelToken,
) -> Result<CommandOutput, RunnerError> {
    if cancel.is_cancelled() {
        return Err(RunnerError::Cancelled);
    }

    debug!(cmd = %spec, cwd = ?spec.cwd, "spawning process");

    let child = Command::new(&spec.program)
        .args(&spec.args)
        .envs(&spec.env)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| RunnerError::Launch {
            program: spec.program.clone(),
            error,
        })?;

    let deadline = async {
        match spec.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        output = child.wait_with_output() => {
            let output = output.map_err(|error| RunnerError::Launch {
                program: spec.program.clone(),
                error,
            })?;

            let result = CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };

            for line in result.stderr.lines() {
                debug!(cmd = %spec, "stderr: {}", line);
            }

            info!(
                cmd = %spec,
                exit_code = ?result.code,
                success = result.is_success(),
                "process exited"
            );
            Ok(result)
        }

        _ = cancel.cancelled() => {
            info!(cmd = %spec, "cancellation requested; killing process");
            Err(RunnerError::Cancelled)
        }

        _ = deadline => {
            let limit = spec.timeout.unwrap_or_default();
            warn!(cmd = %spec, ?limit, "process exceeded its timeout; killing it");
            Err(RunnerError::TimedOut(limit))
        }
    }
}
