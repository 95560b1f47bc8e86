// src/watch/event.rs

//! Watch specifications and the events watchers emit.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// Existing file's content changed (including atomic replace-on-save).
    Changed,
    /// Path did not exist before.
    Created,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Which consumer a watch belongs to, so the runtime can route events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTag {
    /// A module of the current dependency graph; `generation` identifies the
    /// watch set it was created for.
    Module { generation: u64 },
    /// The source catalog watch.
    Catalog,
}

/// Predicate deciding which paths under a watch root are reported.
#[derive(Clone)]
pub struct PathFilter(Arc<dyn Fn(&Path) -> bool + Send + Sync>);

impl PathFilter {
    pub fn new(f: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Matches exactly one file and none of its siblings.
    pub fn exact(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        Self::new(move |p| p == target)
    }

    pub fn matches(&self, path: &Path) -> bool {
        (self.0)(path)
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter").finish_non_exhaustive()
    }
}

/// Everything needed to open one directory watch.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pub root: PathBuf,
    /// The single file this watch is scoped to, if any.
    pub target: Option<PathBuf>,
    pub recursive: bool,
    pub filter: PathFilter,
    pub debounce: Duration,
    pub tag: WatchTag,
}

impl WatchSpec {
    /// Watch of a single module: its parent directory, filtered to the file.
    ///
    /// Returns `None` for a path without a parent directory.
    pub fn for_module(module: &Path, debounce: Duration, generation: u64) -> Option<Self> {
        let root = module.parent().filter(|p| !p.as_os_str().is_empty())?;
        Some(Self {
            root: root.to_path_buf(),
            target: Some(module.to_path_buf()),
            recursive: false,
            filter: PathFilter::exact(module),
            debounce,
            tag: WatchTag::Module { generation },
        })
    }
}
