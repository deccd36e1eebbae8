// src/exec/runner.rs

//! Narrow capability for invoking external tools.
//!
//! The scheduler never spawns processes itself: it hands a [`CommandSpec`] to
//! a [`Runner`] and gets back the exit code and captured output. Production
//! code uses [`super::ProcessRunner`]; tests provide a fake that never spawns
//! anything.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use super::cancel::CancelToken;

/// Boxed future returned by [`Runner::run`].
pub type RunFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandOutput, RunnerError>> + Send + 'a>>;

/// Everything needed to launch one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
    /// Human-readable command line, used in logs and error messages.
    pub display: String,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let display = std::iter::once(program.clone())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            program,
            args,
            env: BTreeMap::new(),
            cwd: PathBuf::from("."),
            timeout: None,
            display,
        }
    }

    /// Run a command line through the platform shell.
    pub fn shell(line: impl Into<String>) -> Self {
        let line = line.into();
        let mut spec = if cfg!(windows) {
            Self::new("cmd", vec!["/C".to_string(), line.clone()])
        } else {
            Self::new("sh", vec!["-c".to_string(), line.clone()])
        };
        spec.display = line;
        spec
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn envs<'a>(mut self, env: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// What to show the user when the command failed: stderr, or stdout for
    /// tools that report errors there.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Why a command produced no [`CommandOutput`].
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to launch '{program}': {error}")]
    Launch {
        program: String,
        error: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// Executes external commands.
pub trait Runner: Send + Sync {
    /// Run `spec` to completion, or until `cancel` fires or the spec's
    /// timeout elapses, in which case the process is killed.
    fn run<'a>(&'a self, spec: &'a CommandSpec, cancel: CancelToken) -> RunFuture<'a>;
}
