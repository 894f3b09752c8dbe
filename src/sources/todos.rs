//! Local checkout scan for `TODO`/`FIX` markers.
//!
//! Not a network source. It is registered only when a scan root is configured
//! and runs on the blocking pool so the other sources keep their threads.

use super::{FetchSummary, GatherContext, Source};
use crate::metrics::{LiveSnapshot, Metric};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATTERN: &str = "FIX|TODO";

static DEFAULT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_PATTERN).expect("default TODO pattern is valid"));

/// Directories never descended into (besides hidden ones).
pub const IGNORED_DIRS: &[&str] = &[
    ".bundle",
    "bower_components",
    "dist",
    "tmp",
    "node_modules",
    "target",
];

pub struct TodoScanSource {
    root: PathBuf,
    pattern: Regex,
}

impl TodoScanSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: DEFAULT_REGEX.clone(),
        }
    }

    pub fn with_pattern(root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            Error::configuration_with_context(
                e.to_string(),
                ErrorContext::new()
                    .with_field_path("todos.pattern")
                    .with_source("config"),
            )
        })?;
        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Count matching lines under `root`. Files that are not valid UTF-8 and
/// symlinks are ignored.
pub fn scan(root: &Path, pattern: &Regex) -> Result<(u64, usize)> {
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("scan root {} is not a directory", root.display()),
        )));
    }

    fn walk(dir: &Path, pattern: &Regex, lines: &mut u64, files: &mut usize) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            // Symlinks are never followed; a link back up the tree would loop.
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if file_type.is_dir() {
                if name.starts_with('.') || IGNORED_DIRS.contains(&&*name) {
                    continue;
                }
                walk(&path, pattern, lines, files);
            } else if let Ok(content) = fs::read_to_string(&path) {
                *files += 1;
                *lines += content.lines().filter(|l| pattern.is_match(l)).count() as u64;
            }
        }
    }

    let mut lines = 0;
    let mut files = 0;
    walk(root, pattern, &mut lines, &mut files);
    Ok((lines, files))
}

#[async_trait]
impl Source for TodoScanSource {
    fn name(&self) -> &'static str {
        "todos"
    }

    fn metrics(&self) -> &'static [Metric] {
        &[Metric::Todos]
    }

    async fn fetch(&self, _ctx: &GatherContext, snapshot: &LiveSnapshot) -> Result<FetchSummary> {
        let root = self.root.clone();
        let pattern = self.pattern.clone();
        let (lines, files) = tokio::task::spawn_blocking(move || scan(&root, &pattern))
            .await
            .map_err(|e| {
                Error::runtime_with_context(e.to_string(), ErrorContext::new().with_source("todos"))
            })??;
        snapshot.increment(Metric::Todos, lines);
        Ok(FetchSummary {
            counted: files,
            skipped: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RepositoryDirectory;

    #[tokio::test]
    async fn test_counts_matching_lines_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "// TODO one\nfn x() {}\n// FIXME two\n").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/b.rb"), "# TODO three\n").unwrap();
        for ignored in ["tmp", ".git", "node_modules"] {
            fs::create_dir(dir.path().join(ignored)).unwrap();
            fs::write(dir.path().join(ignored).join("c.txt"), "TODO hidden\n").unwrap();
        }

        let source = TodoScanSource::new(dir.path());
        let live = LiveSnapshot::new();
        let ctx = GatherContext::new(RepositoryDirectory::unavailable());
        let summary = source.fetch(&ctx, &live).await.unwrap();

        assert_eq!(live.get(Metric::Todos), 3);
        assert_eq!(summary.counted, 2);
    }

    #[tokio::test]
    async fn test_missing_root_fails_the_source() {
        let source = TodoScanSource::new("/definitely/not/here");
        let live = LiveSnapshot::new();
        let ctx = GatherContext::new(RepositoryDirectory::unavailable());
        assert!(source.fetch(&ctx, &live).await.is_err());
        assert_eq!(live.get(Metric::Todos), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "// TODO once\n").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/back")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.rs"), dir.path().join("sub/alias.rs"))
            .unwrap();

        let (lines, files) = scan(dir.path(), &DEFAULT_REGEX).unwrap();
        assert_eq!((lines, files), (1, 1));
    }

    #[test]
    fn test_invalid_pattern_is_a_configuration_error() {
        let err = TodoScanSource::with_pattern(".", "(").err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
