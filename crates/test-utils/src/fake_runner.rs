use std::sync::{Arc, Mutex};
use std::time::Duration;

use builddag::exec::{CancelToken, CommandOutput, CommandSpec, RunFuture, Runner, RunnerError};
use builddag::fs::mock::MockFileSystem;

type Handler = Arc<dyn Fn(&CommandSpec, &MockFileSystem) -> CommandOutput + Send + Sync>;

/// A fake runner that:
/// - records the command line of every command it is asked to run
/// - answers with the first rule whose prefix matches the command line, or
///   plain success when none does
/// - lets rules "produce" files by writing to a shared `MockFileSystem`.
pub struct FakeRunner {
    fs: MockFileSystem,
    rules: Vec<(String, Handler)>,
    delay: Option<Duration>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeRunner {
    pub fn new(fs: MockFileSystem) -> Self {
        Self {
            fs,
            rules: Vec::new(),
            delay: None,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer commands starting with `prefix` with `handler`.
    pub fn on<F>(mut self, prefix: &str, handler: F) -> Self
    where
        F: Fn(&CommandSpec, &MockFileSystem) -> CommandOutput + Send + Sync + 'static,
    {
        self.rules.push((prefix.to_string(), Arc::new(handler)));
        self
    }

    /// Commands starting with `prefix` write each of `paths` and succeed.
    pub fn writes(self, prefix: &str, paths: &[&str]) -> Self {
        let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        self.on(prefix, move |spec, fs| {
            for path in &paths {
                fs.add_file(path, format!("written by `{}`", spec.display));
            }
            CommandOutput::success()
        })
    }

    /// Commands starting with `prefix` exit with `code` and `stderr`.
    pub fn fails(self, prefix: &str, code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.on(prefix, move |_, _| CommandOutput::failure(code, stderr.clone()))
    }

    /// Per-file generator: writes the last argument of the command line
    /// (the `{output}` placeholder) with the contents of the one before it.
    pub fn generates_per_file(self, prefix: &str) -> Self {
        self.on(prefix, |spec, fs| {
            let words: Vec<&str> = spec.display.split_whitespace().collect();
            match words.as_slice() {
                [.., input, _, output] => {
                    let body = fs.contents(input).unwrap_or_default();
                    fs.add_file(output, body);
                    CommandOutput::success()
                }
                _ => CommandOutput::failure(2, "usage: generate -f INPUT -o OUTPUT"),
            }
        })
    }

    /// Every command takes this long (and can be cancelled or time out
    /// meanwhile).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Command lines run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Whether any command starting with `prefix` ran.
    pub fn ran(&self, prefix: &str) -> bool {
        self.executed().iter().any(|c| c.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.executed.lock().unwrap().clear();
    }

    pub fn fs(&self) -> &MockFileSystem {
        &self.fs
    }
}

impl Runner for FakeRunner {
    fn run<'a>(&'a self, spec: &'a CommandSpec, mut cancel: CancelToken) -> RunFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(RunnerError::Cancelled);
            }
            self.executed.lock().unwrap().push(spec.display.clone());

            if let Some(delay) = self.delay {
                let limit = spec.timeout.unwrap_or(Duration::MAX);
                tokio::select! {
                    _ = tokio::time::sleep(delay), if delay <= limit => {}
                    _ = tokio::time::sleep(limit), if delay > limit => {
                        return Err(RunnerError::TimedOut(limit));
                    }
                    _ = cancel.cancelled() => return Err(RunnerError::Cancelled),
                }
            }

            let handler = self
                .rules
                .iter()
                .find(|(prefix, _)| spec.display.starts_with(prefix.as_str()))
                .map(|(_, handler)| Arc::clone(handler));

            Ok(match handler {
                Some(handler) => handler(spec, &self.fs),
                None => CommandOutput::success(),
            })
        })
    }
}
