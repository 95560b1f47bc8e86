// src/watch/exclude.rs

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{BundlewatchError, Result};

/// Modules matching any of these globs are never watched (vendored
/// dependency trees such as `**/node_modules/**`).
#[derive(Clone)]
pub struct ExcludeFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for ExcludeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcludeFilter")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl ExcludeFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns.iter() {
            let glob = Glob::new(pattern).map_err(|e| {
                BundlewatchError::ConfigError(format!("invalid exclude pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| BundlewatchError::ConfigError(format!("building exclude set: {e}")))?;

        Ok(Self { patterns, set })
    }

    /// Excludes nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.set.is_match(normalized.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendored_modules_are_excluded() {
        let filter = ExcludeFilter::new(["**/node_modules/**"]).unwrap();
        assert!(filter.is_excluded(Path::new("/proj/node_modules/lodash/index.js")));
        assert!(filter.is_excluded(Path::new("/proj/a/node_modules/x/y/z.mjs")));
        assert!(!filter.is_excluded(Path::new("/proj/src/node_modules_like.js")));
        assert!(!filter.is_excluded(Path::new("/proj/src/main.js")));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = ExcludeFilter::new(["a/[b"]).unwrap_err();
        assert!(matches!(err, BundlewatchError::ConfigError(_)));
    }

    #[test]
    fn none_excludes_nothing() {
        assert!(!ExcludeFilter::none().is_excluded(Path::new("/x/node_modules/y.js")));
    }
}
