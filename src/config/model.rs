// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [plugins]
/// source = "/home/me/dokumente"
/// destination = "/home/me/.cache/dokumente"
///
/// [bundler]
/// cmd = "rollup -c -i {source} -d {dest}"
///
/// [watch]
/// debounce_ms = 50
/// exclude = ["**/node_modules/**"]
/// ```
///
/// This is the unvalidated form; use [`ConfigFile`] everywhere else.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub plugins: PluginsSection,

    #[serde(default)]
    pub bundler: BundlerSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// `[plugins]` section: where documents live and where bundles go.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginsSection {
    /// Root directory of the document sources. Bundle requests name their
    /// entry file relative to this.
    #[serde(default)]
    pub source: PathBuf,

    /// Output directory handed to the bundler.
    #[serde(default)]
    pub destination: PathBuf,
}

/// `[bundler]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BundlerSection {
    /// Shell command run for each compile. `{source}` and `{dest}` are
    /// substituted with the (quoted) entry file and output directory.
    #[serde(default)]
    pub cmd: String,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchSection {
    /// Coalescing window for file events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Glob patterns for modules that are never watched.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Skip rebuilds when a changed module's content hash is unchanged.
    #[serde(default)]
    pub use_hash: bool,

    /// After a failed initial compile, watch the entry file and the
    /// offending file so that fixing them triggers a rebuild.
    #[serde(default)]
    pub rearm_on_failure: bool,
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_exclude() -> Vec<String> {
    vec!["**/node_modules/**".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            exclude: default_exclude(),
            use_hash: false,
            rearm_on_failure: false,
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub plugins: PluginsSection,
    pub bundler: BundlerSection,
    pub watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        plugins: PluginsSection,
        bundler: BundlerSection,
        watch: WatchSection,
    ) -> Self {
        Self {
            plugins,
            bundler,
            watch,
        }
    }
}
