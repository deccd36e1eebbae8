// src/context.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::exec::Runner;
use crate::fs::FileSystem;
use crate::stale::{FingerprintStrategy, TimestampStrategy};

/// Collaborators shared by every task of one build.
///
/// All paths handed to tasks and recorded in the build state are relative to
/// `root`; the context turns them into filesystem paths.
#[derive(Clone)]
pub struct BuildContext {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn Runner>,
    fingerprints: Arc<dyn FingerprintStrategy>,
    workers: usize,
    default_timeout: Option<Duration>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .field("fingerprints", &self.fingerprints)
            .field("workers", &self.workers)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// Context with timestamp fingerprints, one worker per CPU and no
    /// default timeout.
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self {
            root: root.into(),
            fs,
            runner,
            fingerprints: Arc::new(TimestampStrategy),
            workers: default_workers(),
            default_timeout: None,
        }
    }

    pub fn with_fingerprints(mut self, fingerprints: Arc<dyn FingerprintStrategy>) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn runner(&self) -> &Arc<dyn Runner> {
        &self.runner
    }

    pub fn fingerprints(&self) -> &dyn FingerprintStrategy {
        self.fingerprints.as_ref()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Filesystem path of a root-relative path.
    pub fn abs(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
