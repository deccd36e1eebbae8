// src/stale/fingerprint.rs

use std::fmt::Debug;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;
use crate::stale::cache::FileCache;
use crate::types::FingerprintMode;

/// Identity of a file's state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fingerprint {
    /// Modification time in nanoseconds since the Unix epoch.
    Modified(u64),
    /// blake3 digest of the file contents (hex).
    Content(String),
}

impl Fingerprint {
    /// Modification stamp, if this fingerprint is time based.
    pub fn stamp(&self) -> Option<u64> {
        match self {
            Fingerprint::Modified(nanos) => Some(*nanos),
            Fingerprint::Content(_) => None,
        }
    }
}

/// Pluggable way of fingerprinting files.
pub trait FingerprintStrategy: Send + Sync + Debug {
    fn fingerprint(&self, fs: &dyn FileSystem, path: &Path) -> Result<Fingerprint>;
}

/// Fingerprints files by modification time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampStrategy;

impl FingerprintStrategy for TimestampStrategy {
    fn fingerprint(&self, fs: &dyn FileSystem, path: &Path) -> Result<Fingerprint> {
        let modified = fs.modified(path)?;
        let since_epoch = modified
            .duration_since(UNIX_EPOCH)
            .with_context(|| format!("modification time of {:?} predates the epoch", path))?;
        let nanos = u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX);
        Ok(Fingerprint::Modified(nanos))
    }
}

/// Fingerprints files by content hash, caching hashes per modification time.
#[derive(Debug, Default)]
pub struct ContentHashStrategy {
    cache: Mutex<FileCache>,
}

impl ContentHashStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStrategy for ContentHashStrategy {
    fn fingerprint(&self, fs: &dyn FileSystem, path: &Path) -> Result<Fingerprint> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let hash = cache.get_or_compute(fs, path)?;
        Ok(Fingerprint::Content(hash))
    }
}

/// Build the strategy selected in config.
pub fn strategy_for_mode(mode: FingerprintMode) -> Arc<dyn FingerprintStrategy> {
    match mode {
        FingerprintMode::Timestamp => Arc::new(TimestampStrategy),
        FingerprintMode::Content => Arc::new(ContentHashStrategy::new()),
    }
}
