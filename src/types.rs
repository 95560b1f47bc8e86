// src/types.rs

//! Small value types shared between the engine, the watcher and the host
//! protocol.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed, sendable future used at the trait seams (`Bundler`,
/// `DirectoryWatcher`, `HostSink`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifier of a viewer instance attached by the host shell.
pub type ViewerId = u64;

/// Opaque payload handed through to the viewer untouched.
pub type ComponentArgs = serde_json::Value;

/// A request to compile one document and keep it compiled.
///
/// Immutable once issued; a new request supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRequest {
    /// Entry file, relative to the configured source root.
    pub source_file: PathBuf,
    /// Absolute output directory.
    pub destination_dir: PathBuf,
    /// Passed through to the viewer on every delivery.
    #[serde(default)]
    pub component_args: ComponentArgs,
}

impl BundleRequest {
    pub fn new(
        source_file: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        component_args: ComponentArgs,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            destination_dir: destination_dir.into(),
            component_args,
        }
    }

    /// Absolute entry path given the configured source root.
    pub fn entry_path(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.source_file)
    }
}

/// Ordered list of absolute module paths a successful compile depended on.
///
/// Order is compilation order and carries no meaning for watching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    modules: Vec<PathBuf>,
}

impl DependencyGraph {
    pub fn new(modules: Vec<PathBuf>) -> Self {
        Self { modules }
    }

    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl FromIterator<PathBuf> for DependencyGraph {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for DependencyGraph {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.into_iter()
    }
}
