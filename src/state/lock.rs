// src/state/lock.rs

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::BuildError;

use super::STATE_DIR;

/// Exclusive lock on a project's state directory.
///
/// Backed by an OS advisory lock on `<root>/.builddag/lock`, which the OS
/// drops when the file is closed: on drop, or when the process dies. The
/// file itself stays behind and only records the pid of the last holder.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
    file: File,
}

impl BuildLock {
    /// Take `<root>/.builddag/lock`, failing at once if it is held.
    pub fn acquire(root: &Path) -> Result<Self, BuildError> {
        let dir = root.join(STATE_DIR);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating state directory {:?}", dir))
            .map_err(BuildError::State)?;

        let path = dir.join("lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file {:?}", path))
            .map_err(BuildError::State)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(BuildError::Locked(path)),
            Err(TryLockError::Error(e)) => {
                return Err(BuildError::State(
                    anyhow::Error::new(e).context(format!("locking {:?}", path)),
                ));
            }
        }

        let mut lock = Self { path, file };
        if let Err(e) = lock.record_pid() {
            warn!(path = ?lock.path, error = %e, "failed to record pid in build lock");
        }
        debug!(path = ?lock.path, "acquired build lock");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_pid(&mut self) -> std::io::Result<()> {
        self.file.set_len(0)?;
        writeln!(self.file, "{}", std::process::id())
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = ?self.path, error = %e, "failed to release build lock");
        } else {
            debug!(path = ?self.path, "released build lock");
        }
    }
}
