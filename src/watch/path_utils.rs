// src/watch/path_utils.rs

//! Path helpers shared by the catalog scan and its watch filter.

use std::path::Path;

/// `path` relative to `root`, with forward slashes.
///
/// Falls back to canonicalized paths when the plain prefix does not match
/// (symlinked roots, `/private/var` vs `/var` on macOS). Returns `None` if
/// `path` is not below `root` either way.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

/// Document entry files: `.html`, not starting with `_` (partials).
pub fn is_document_file(name: &str) -> bool {
    name.ends_with(".html") && !name.starts_with('_')
}
