// src/task/locator.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::fs::FileSystem;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Lazily-resolved reference to a set of files under the project root.
///
/// A locator is a glob such as `view/**/*.templ` or a literal path such as
/// `build/app`, plus optional exclude globs. Nothing touches the filesystem
/// until [`Locator::resolve`] is called, so a locator can name files that a
/// generation task has not produced yet.
#[derive(Clone)]
pub struct Locator {
    pattern: String,
    /// Literal directory prefix of the pattern; the only part that is walked.
    base: PathBuf,
    literal: bool,
    include: GlobMatcher,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl Locator {
    pub fn new(pattern: &str) -> Result<Self> {
        Self::with_excludes(pattern, &[])
    }

    pub fn with_excludes(pattern: &str, excludes: &[String]) -> Result<Self> {
        let pattern = pattern.trim().trim_start_matches("./").to_string();
        if pattern.is_empty() {
            anyhow::bail!("empty locator pattern");
        }
        if Path::new(&pattern).is_absolute() {
            anyhow::bail!("locator pattern must be relative to the project root: {pattern}");
        }

        let include = compile_glob(&pattern)?.compile_matcher();

        let exclude = if excludes.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pat in excludes {
                builder.add(compile_glob(pat)?);
            }
            Some(
                builder
                    .build()
                    .with_context(|| format!("building exclude set for {pattern}"))?,
            )
        };

        let (base, literal) = literal_prefix(&pattern);

        Ok(Self {
            pattern,
            base,
            literal,
            include,
            exclude,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern contains no glob syntax.
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Whether a root-relative, `/`-separated path belongs to this locator.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }

    /// Resolve to the files that currently exist, as sorted root-relative
    /// paths.
    ///
    /// A missing base directory resolves to nothing; an unreadable one is an
    /// error. Symlinked directories below the base are not descended into.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
        let start = root.join(&self.base);

        if self.literal {
            if fs.is_file(&start) {
                return Ok(vec![self.base.clone()]);
            }
            if !fs.is_dir(&start) {
                return Ok(Vec::new());
            }
            // A literal directory stands for everything beneath it.
            return self.walk(fs, root, &start, true);
        }

        if !fs.is_dir(&start) {
            return Ok(Vec::new());
        }
        self.walk(fs, root, &start, false)
    }

    fn walk(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
        start: &Path,
        take_all: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![start.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = fs
                .read_dir(&dir)
                .with_context(|| format!("resolving locator '{}'", self.pattern))?;
            for path in entries {
                if fs.is_dir(&path) {
                    if fs.is_symlink(&path) {
                        debug!(
                            path = ?path,
                            locator = %self.pattern,
                            "not following symlinked directory"
                        );
                        continue;
                    }
                    stack.push(path);
                } else if fs.is_file(&path) {
                    let Some(rel) = relative_to(root, &path) else {
                        continue;
                    };
                    let rel_str = to_slash(&rel);
                    let wanted = if take_all {
                        self.exclude.as_ref().is_none_or(|ex| !ex.is_match(&rel_str))
                    } else {
                        self.matches(&rel_str)
                    };
                    if wanted {
                        files.push(rel);
                    }
                }
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }
}

fn compile_glob(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Split a pattern into the directory prefix that contains no glob syntax.
///
/// Returns `(prefix, true)` when the whole pattern is literal.
fn literal_prefix(pattern: &str) -> (PathBuf, bool) {
    if !pattern.contains(GLOB_META) {
        return (PathBuf::from(pattern), true);
    }

    let mut base = PathBuf::new();
    for segment in pattern.split('/') {
        if segment.contains(GLOB_META) {
            break;
        }
        base.push(segment);
    }
    (base, false)
}

fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    let cleaned: PathBuf = rel
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect();
    Some(cleaned)
}

pub(crate) fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
