// src/watch/hash.rs

//! Content hashing for `use_hash`: a module change only triggers a rebuild
//! when the file's bytes actually differ from what was last seen.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last known content hash per module path.
#[derive(Debug)]
pub struct ContentHashes {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, String>,
}

impl ContentHashes {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    /// Record the current hash of `path`. Unreadable files are forgotten.
    pub fn record(&mut self, path: &Path) {
        match compute_file_hash(self.fs.as_ref(), path) {
            Ok(hash) => {
                self.hashes.insert(path.to_path_buf(), hash);
            }
            Err(err) => {
                debug!(?path, error = %err, "could not hash file");
                self.hashes.remove(path);
            }
        }
    }

    /// Re-hash `path` and report whether it differs from the recorded hash.
    ///
    /// Unknown or unreadable files count as changed.
    pub fn refresh(&mut self, path: &Path) -> bool {
        let new_hash = match compute_file_hash(self.fs.as_ref(), path) {
            Ok(h) => h,
            Err(err) => {
                debug!(?path, error = %err, "could not hash file; treating as changed");
                self.hashes.remove(path);
                return true;
            }
        };

        match self.hashes.insert(path.to_path_buf(), new_hash.clone()) {
            Some(old) if old == new_hash => false,
            _ => true,
        }
    }

    /// Drop everything not in `keep`.
    pub fn retain(&mut self, keep: &[PathBuf]) {
        self.hashes.retain(|p, _| keep.contains(p));
    }
}
