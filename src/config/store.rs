// src/config/store.rs

//! Persisted settings addressed by dotted key paths.
//!
//! The store keeps the whole TOML document as a table so that keys the typed
//! [`ConfigFile`] does not know about (window bounds, host preferences, ...)
//! survive a `set` + `save` round unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use toml::{Table, Value};
use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BundlewatchError, Result};
use crate::fs::FileSystem;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    table: Table,
    fs: Arc<dyn FileSystem>,
}

impl ConfigStore {
    /// Open the store backed by `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let path = path.into();
        let table = if fs.exists(&path) {
            let contents = fs.read_to_string(&path)?;
            toml::from_str::<Table>(&contents)?
        } else {
            debug!(?path, "config file missing; starting with an empty store");
            Table::new()
        };

        Ok(Self { path, table, fs })
    }

    /// Build a store from an in-memory table; nothing is read from disk.
    pub fn from_table(path: impl Into<PathBuf>, table: Table, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            table,
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value at `key` (e.g. `"plugins.source"`), if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let segments = parse_key(key).ok()?;
        let (last, parents) = segments.split_last()?;

        let mut table = &self.table;
        for segment in parents {
            table = table.get(*segment)?.as_table()?;
        }
        table.get(*last)
    }

    /// Set `key` to `value`, creating intermediate tables as needed.
    ///
    /// Fails if an intermediate segment already holds a non-table value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let segments = parse_key(key)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(BundlewatchError::ConfigError(format!(
                "invalid config key '{key}'"
            )));
        };

        let mut table = &mut self.table;
        for segment in parents {
            let entry = table
                .entry(segment.to_string())
                .or_insert(Value::Table(Table::new()));
            table = match entry {
                Value::Table(inner) => inner,
                _ => {
                    return Err(BundlewatchError::ConfigError(format!(
                        "cannot set '{key}': '{segment}' is not a table"
                    )));
                }
            };
        }

        table.insert(last.to_string(), value.into());
        debug!(key, "config value set");
        Ok(())
    }

    /// Write the store back to its file.
    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(&self.table)?;
        self.fs.write(&self.path, contents.as_bytes())?;
        info!(path = ?self.path, "config saved");
        Ok(())
    }

    /// Validated, typed view of the current contents.
    pub fn to_config(&self) -> Result<ConfigFile> {
        let raw: RawConfigFile = Value::Table(self.table.clone()).try_into()?;
        ConfigFile::try_from(raw)
    }
}

fn parse_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').collect();
    if key.is_empty() || segments.iter().any(|s| s.trim().is_empty()) {
        return Err(BundlewatchError::ConfigError(format!(
            "invalid config key '{key}'"
        )));
    }
    Ok(segments)
}

/// Convert a JSON value coming from the host into a TOML value.
///
/// `null` has no TOML representation and is rejected.
pub fn json_to_toml(value: serde_json::Value) -> Result<Value> {
    if value.is_null() {
        return Err(BundlewatchError::ConfigError(
            "null cannot be stored in the config".to_string(),
        ));
    }
    Ok(Value::try_from(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn store() -> ConfigStore {
        ConfigStore::from_table("config.toml", Table::new(), Arc::new(MockFileSystem::new()))
    }

    #[test]
    fn set_creates_intermediate_tables() {
        let mut store = store();
        store.set("window_bounds.main.width", 800).unwrap();
        assert_eq!(
            store.get("window_bounds.main.width").and_then(Value::as_integer),
            Some(800)
        );
        assert!(store.get("window_bounds.main").unwrap().is_table());
    }

    #[test]
    fn set_through_scalar_is_rejected() {
        let mut store = store();
        store.set("plugins", "flat").unwrap();
        let err = store.set("plugins.source", "/src").unwrap_err();
        assert!(matches!(err, BundlewatchError::ConfigError(_)));
    }

    #[test]
    fn empty_segments_are_rejected() {
        let mut store = store();
        assert!(store.set("plugins..source", "x").is_err());
        assert!(store.set("", "x").is_err());
        assert!(store.get("a..b").is_none());
    }

    #[test]
    fn null_json_is_rejected() {
        assert!(json_to_toml(serde_json::Value::Null).is_err());
        assert_eq!(
            json_to_toml(serde_json::json!(5)).unwrap().as_integer(),
            Some(5)
        );
    }
}
