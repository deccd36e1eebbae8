// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: u64 },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    unreadable: HashSet<PathBuf>,
    /// Logical clock: every write or touch advances it by one tick.
    clock: u64,
}

/// In-memory filesystem with a deterministic clock.
///
/// Modification times are `UNIX_EPOCH + tick seconds`, where the tick grows
/// by one on every write, so "written later" always means "strictly newer"
/// no matter how fast a test runs. Paths are normalised (`./a/b` == `a/b`).
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    if path == Path::new(".") {
        return None;
    }
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Some(PathBuf::from(".")),
        Some(parent) => Some(parent.to_path_buf()),
        None => None,
    }
}

fn tick_time(tick: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(tick)
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock()
            .entries
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked mid-write;
        // the map itself is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mut state = self.lock();
        state.clock += 1;
        let modified = state.clock;
        state.entries.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );
        Self::link_into_parent(&mut state, &path);
    }

    /// Bump the modification time of an existing file without changing it.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut state = self.lock();
        state.clock += 1;
        let now = state.clock;
        if let Some(MockEntry::File { modified, .. }) = state.entries.get_mut(&path) {
            *modified = now;
        }
    }

    /// Make `read_dir` on this directory fail, as a permission error would.
    pub fn set_unreadable(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut state = self.lock();
        Self::ensure_dir_entry(&mut state, &path);
        state.unreadable.insert(path);
    }

    /// Current logical time (number of writes so far).
    pub fn now(&self) -> u64 {
        self.lock().clock
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(&normalize(path.as_ref())) {
            Some(MockEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    /// All files currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File { .. }))
            .map(|(p, _)| p.clone())
            .collect();
        files.sort();
        files
    }

    fn link_into_parent(state: &mut MockState, path: &Path) {
        if let Some(parent) = parent_of(path) {
            Self::ensure_dir_entry(state, &parent);
            if let Some(MockEntry::Dir(children)) = state.entries.get_mut(&parent) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if !children.iter().any(|c| c == name) {
                        children.push(name.to_string());
                    }
                }
            }
        }
    }

    fn ensure_dir_entry(state: &mut MockState, path: &Path) {
        if !state.entries.contains_key(path) {
            state
                .entries
                .insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
            Self::link_into_parent(state, path);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.open_read(path).and_then(|mut r| {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf)?;
            Ok(buf)
        })?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let state = self.lock();
        match state.entries.get(&normalize(path)) {
            Some(MockEntry::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut state = self.lock();
        match state.entries.get(&path) {
            Some(MockEntry::File { .. }) => {}
            Some(MockEntry::Dir(_)) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => return Err(anyhow!("File not found: {:?}", path)),
        }
        state.entries.remove(&path);
        if let Some(parent) = parent_of(&path) {
            if let Some(MockEntry::Dir(children)) = state.entries.get_mut(&parent) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    children.retain(|c| c != name);
                }
            }
        }
        Ok(())
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let state = self.lock();
        match state.entries.get(&normalize(path)) {
            Some(MockEntry::File { modified, .. }) => Ok(tick_time(*modified)),
            Some(MockEntry::Dir(_)) => Ok(tick_time(0)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(&normalize(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.lock().entries.get(&normalize(path)),
            Some(MockEntry::File { .. })
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(
            self.lock().entries.get(&normalize(path)),
            Some(MockEntry::Dir(_))
        )
    }

    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        let key = normalize(path);
        if state.unreadable.contains(&key) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get(&key) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_advance_the_clock() {
        let fs = MockFileSystem::new();
        fs.add_file("a.txt", "a");
        fs.add_file("./b.txt", "b");

        let a = fs.modified(Path::new("./a.txt")).unwrap();
        let b = fs.modified(Path::new("b.txt")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn remove_unlinks_from_parent() {
        let fs = MockFileSystem::new();
        fs.add_file("view/a.tmpl", "x");
        fs.remove_file(Path::new("./view/a.tmpl")).unwrap();

        assert!(!fs.exists(Path::new("view/a.tmpl")));
        assert!(fs.read_dir(Path::new("view")).unwrap().is_empty());
    }
}
