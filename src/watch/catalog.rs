// src/watch/catalog.rs

//! Source catalog: which documents exist under the source root.
//!
//! The catalog is one level deep: every directory directly below the root is
//! a repository, and its `.html` files (minus `_` partials) are documents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::watch::event::{PathFilter, WatchSpec, WatchTag};
use crate::watch::path_utils::{is_document_file, relative_str};

/// Repository name → sorted document file names.
pub type Catalog = BTreeMap<String, Vec<String>>;

/// Scan `root` for repositories and their documents.
///
/// Unreadable repositories are logged and listed empty.
pub fn scan_source(fs: &dyn FileSystem, root: &Path) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    for dir in fs.read_dir(root)? {
        if !fs.is_dir(&dir) {
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let mut documents: Vec<String> = match fs.read_dir(&dir) {
            Ok(entries) => entries
                .iter()
                .filter(|p| fs.is_file(p))
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
                .filter(|n| is_document_file(n))
                .map(str::to_string)
                .collect(),
            Err(err) => {
                warn!(dir = ?dir, error = %err, "could not list repository");
                Vec::new()
            }
        };
        documents.sort();
        catalog.insert(name.to_string(), documents);
    }

    debug!(repos = catalog.len(), "scanned source catalog");
    Ok(catalog)
}

/// Watch spec for the catalog: repository directories directly below `root`
/// and `.html` files anywhere under it.
pub fn catalog_watch_spec(root: &Path, debounce: Duration) -> WatchSpec {
    let filter_root: PathBuf = root.to_path_buf();
    let filter = PathFilter::new(move |path| match relative_str(&filter_root, path) {
        Some(rel) if rel.ends_with(".html") => true,
        Some(rel) if !rel.is_empty() && !rel.contains('/') => is_repository_entry(path),
        _ => false,
    });

    WatchSpec {
        root: root.to_path_buf(),
        target: None,
        recursive: true,
        filter,
        debounce,
        tag: WatchTag::Catalog,
    }
}

/// A top-level entry counts when it is a directory. Once removed there is
/// nothing to stat, so a vanished entry counts when it has no extension.
fn is_repository_entry(path: &Path) -> bool {
    if path.exists() {
        path.is_dir()
    } else {
        path.extension().is_none()
    }
}
