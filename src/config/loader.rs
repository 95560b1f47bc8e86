// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::store::ConfigStore;
use crate::errors::Result;
use crate::fs::RealFileSystem;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Open the dotted-path store for `path` on the real filesystem.
pub fn open_store(path: impl Into<PathBuf>) -> Result<ConfigStore> {
    ConfigStore::open(path, Arc::new(RealFileSystem))
}

/// Default config location: `Bundlewatch.toml` in the working directory,
/// unless `BUNDLEWATCH_CONFIG` points elsewhere.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("BUNDLEWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Bundlewatch.toml"))
}
