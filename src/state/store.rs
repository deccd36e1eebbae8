// src/state/store.rs

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::types::StateStorageMode;

use super::{BuildState, STATE_DIR};

/// Loads and saves [`BuildState`].
pub trait StateStore: Send + Sync + Debug {
    fn load(&self) -> Result<BuildState>;
    fn save(&self, state: &BuildState) -> Result<()>;
}

/// JSON file under the project's state directory.
#[derive(Debug)]
pub struct FileStateStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    /// `<root>/.builddag/state.json`
    pub fn in_root(fs: Arc<dyn FileSystem>, root: &Path) -> Self {
        Self::new(fs, root.join(STATE_DIR).join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<BuildState> {
        if !self.fs.exists(&self.path) {
            debug!(path = ?self.path, "no build state yet");
            return Ok(BuildState::default());
        }

        let raw = self.fs.read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "build state is unreadable; starting fresh");
                Ok(BuildState::default())
            }
        }
    }

    fn save(&self, state: &BuildState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state).context("serialising build state")?;
        self.fs
            .write(&self.path, &json)
            .with_context(|| format!("saving build state to {:?}", self.path))
    }
}

/// Keeps state for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<BuildState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<BuildState> {
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, state: &BuildState) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        Ok(())
    }
}

pub fn store_for_mode(
    mode: StateStorageMode,
    fs: Arc<dyn FileSystem>,
    root: &Path,
) -> Arc<dyn StateStore> {
    match mode {
        StateStorageMode::File => Arc::new(FileStateStore::in_root(fs, root)),
        StateStorageMode::Memory => Arc::new(MemoryStateStore::new()),
    }
}
