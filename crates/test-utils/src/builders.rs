use std::sync::Arc;

use bundlewatch::config::{ConfigFile, ConfigStore};
use bundlewatch::fs::FileSystem;
use bundlewatch::fs::mock::MockFileSystem;

/// Path the builder's stores pretend to live at.
pub const CONFIG_PATH: &str = "/cfg/Bundlewatch.toml";

/// Builder for a `ConfigStore` to simplify test setup.
///
/// Starts from a valid config: source `/src`, destination `/out`, a dummy
/// bundler command and the default `[watch]` settings.
pub struct ConfigBuilder {
    entries: Vec<(String, toml::Value)>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            entries: vec![
                ("plugins.source".into(), "/src".into()),
                ("plugins.destination".into(), "/out".into()),
                ("bundler.cmd".into(), "fake-bundler".into()),
            ],
        }
    }

    /// Set any dotted key, overriding earlier values.
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    pub fn with_source(self, source: &str) -> Self {
        self.with("plugins.source", source)
    }

    pub fn with_destination(self, destination: &str) -> Self {
        self.with("plugins.destination", destination)
    }

    pub fn with_exclude(self, patterns: &[&str]) -> Self {
        let patterns: Vec<toml::Value> = patterns.iter().map(|p| (*p).into()).collect();
        self.with("watch.exclude", patterns)
    }

    pub fn with_use_hash(self, val: bool) -> Self {
        self.with("watch.use_hash", val)
    }

    pub fn with_rearm_on_failure(self, val: bool) -> Self {
        self.with("watch.rearm_on_failure", val)
    }

    pub fn with_debounce_ms(self, ms: i64) -> Self {
        self.with("watch.debounce_ms", ms)
    }

    /// Store at [`CONFIG_PATH`] on top of `fs`. Nothing is written until the
    /// store is saved.
    pub fn build_store(self, fs: Arc<dyn FileSystem>) -> ConfigStore {
        let mut store = ConfigStore::from_table(CONFIG_PATH, toml::Table::new(), fs);
        for (key, value) in self.entries {
            store
                .set(&key, value)
                .unwrap_or_else(|e| panic!("Failed to set {key} in builder: {e}"));
        }
        store
    }

    pub fn build(self) -> ConfigFile {
        self.build_store(Arc::new(MockFileSystem::new()))
            .to_config()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
