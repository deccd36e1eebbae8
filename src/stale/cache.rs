// src/stale/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::stale::hash::compute_file_hash;

/// In-memory cache of content hashes, keyed by path and modification time.
///
/// A file is only re-read when its modification time differs from the one
/// seen when it was last hashed.
#[derive(Debug, Default)]
pub struct FileCache {
    hashes: HashMap<PathBuf, (SystemTime, String)>,
}

impl FileCache {
    pub fn new() -> Self {
        Self {
            hashes: HashMap::new(),
        }
    }

    /// Get the hash for a file, computing and caching it if necessary.
    pub fn get_or_compute(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<String> {
        let modified = fs.modified(path)?;
        if let Some((seen, hash)) = self.hashes.get(path) {
            if *seen == modified {
                return Ok(hash.clone());
            }
        }

        debug!("cache miss: computing hash for {:?}", path);
        let hash = compute_file_hash(fs, path)?;
        self.hashes
            .insert(path.to_path_buf(), (modified, hash.clone()));
        Ok(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
